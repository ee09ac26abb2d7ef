//! Public delivery paths for site content.
//!
//! Mirrors the public router: a changed post is visible on its detail page,
//! the homepage, every tag and month listing it appears in, and the feeds.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::domain::content::ContentItem;

use super::purge::PathGenerator;

/// Characters that must be percent-encoded within a single path segment.
const SEGMENT_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Same as [`SEGMENT_SET`] but keeps `/` so nested upload paths stay nested.
const UPLOAD_PATH_SET: &AsciiSet = &SEGMENT_SET.remove(b'/');

const HOME_PATH: &str = "/";
const FEED_PATHS: [&str; 2] = ["/rss.xml", "/atom.xml"];
const SITEMAP_PATH: &str = "/sitemap.xml";

/// Maps [`ContentItem`]s onto the routes the public site serves them from.
#[derive(Debug, Clone, Copy, Default)]
pub struct SitePathGenerator;

impl PathGenerator for SitePathGenerator {
    type Item = ContentItem;

    fn paths(&self, item: &ContentItem) -> Vec<String> {
        match item {
            ContentItem::Post { slug, tags, month } => {
                let mut paths = vec![format!("/posts/{}", segment(slug)), HOME_PATH.to_string()];
                paths.extend(tags.iter().map(|tag| tag_path(tag)));
                if let Some(month) = month {
                    paths.push(format!("/months/{}", segment(month)));
                }
                paths.extend(FEED_PATHS.iter().map(|path| path.to_string()));
                paths.push(SITEMAP_PATH.to_string());
                paths
            }
            ContentItem::Page { slug } => {
                vec![format!("/{}", segment(slug)), SITEMAP_PATH.to_string()]
            }
            ContentItem::Tag { slug } => vec![tag_path(slug)],
            ContentItem::Upload { stored_path } => {
                let relative = stored_path.trim_start_matches('/');
                vec![format!(
                    "/uploads/{}",
                    utf8_percent_encode(relative, UPLOAD_PATH_SET)
                )]
            }
            ContentItem::SiteSettings => {
                let mut paths = vec![HOME_PATH.to_string()];
                paths.extend(FEED_PATHS.iter().map(|path| path.to_string()));
                paths
            }
        }
    }
}

fn tag_path(slug: &str) -> String {
    format!("/tags/{}", segment(slug))
}

fn segment(value: &str) -> String {
    utf8_percent_encode(value, SEGMENT_SET).to_string()
}
