//! Content whose public copies live behind the CDN.

/// A piece of published content that changed and may be cached at the edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentItem {
    /// A post served at `/posts/{slug}` and listed on index, tag, month and feed pages.
    Post {
        slug: String,
        tags: Vec<String>,
        /// Archive month in `YYYY-MM` form, when the post has been published.
        month: Option<String>,
    },
    /// A standalone page served at `/{slug}`.
    Page { slug: String },
    /// A tag listing served at `/tags/{slug}`.
    Tag { slug: String },
    /// An uploaded asset, addressed by its stored relative path.
    Upload { stored_path: String },
    /// Site-wide settings; affects the chrome of every rendered page.
    SiteSettings,
}

impl ContentItem {
    pub fn post(slug: impl Into<String>) -> Self {
        Self::Post {
            slug: slug.into(),
            tags: Vec::new(),
            month: None,
        }
    }

    pub fn page(slug: impl Into<String>) -> Self {
        Self::Page { slug: slug.into() }
    }

    pub fn tag(slug: impl Into<String>) -> Self {
        Self::Tag { slug: slug.into() }
    }

    pub fn upload(stored_path: impl Into<String>) -> Self {
        Self::Upload {
            stored_path: stored_path.into(),
        }
    }

    /// Attach tag slugs to a post; no effect on other kinds.
    pub fn with_tags<I, S>(mut self, new_tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Self::Post { tags, .. } = &mut self {
            tags.extend(new_tags.into_iter().map(Into::into));
        }
        self
    }

    /// Set the archive month of a post; no effect on other kinds.
    pub fn in_month(mut self, value: impl Into<String>) -> Self {
        if let Self::Post { month, .. } = &mut self {
            *month = Some(value.into());
        }
        self
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Post { .. } => "post",
            Self::Page { .. } => "page",
            Self::Tag { .. } => "tag",
            Self::Upload { .. } => "upload",
            Self::SiteSettings => "site_settings",
        }
    }
}
