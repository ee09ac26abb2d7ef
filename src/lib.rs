//! Soffio CDN purge dispatcher.
//!
//! When published content changes, [`application::purge::PurgeDispatcher`]
//! works out the public URLs that serve it and asks the CDN to evict them.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;

pub use application::paths::SitePathGenerator;
pub use application::purge::{PathGenerator, PurgeDispatcher, PurgeSetupError, purge_targets};
pub use config::{CdnSettings, RawCdnSettings};
pub use domain::content::ContentItem;
pub use infra::error::InfraError;
pub use infra::identity::{AccessToken, CredentialProvider, TokenRequest};
