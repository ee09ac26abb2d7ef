//! Purge dispatch: turn changed content into one CDN purge request.
//!
//! The dispatcher collects delivery paths for every item, drops duplicates
//! and the site root, then asks the CDN endpoint to evict what is left.
//! Authentication happens once, on the first purge; the resulting client
//! is kept for the dispatcher's lifetime and its token is never renewed.

use std::{collections::HashSet, sync::Arc};

use reqwest::Client;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::{
    config::{CdnSettings, LoadError, RawCdnSettings},
    infra::{
        cdn::{CdnManagementClient, EndpointRef},
        error::InfraError,
        identity::{ClientCredentialsProvider, CredentialProvider, TokenRequest, user_agent},
        telemetry::{PURGE_FAILURES_TOTAL, PURGE_PATHS, PURGE_REQUESTS_TOTAL},
    },
};

/// Purging the root would evict the whole site; it is always dropped.
pub const ROOT_PATH: &str = "/";

/// Maps a content item to the absolute URL paths it is publicly served from.
pub trait PathGenerator: Send + Sync {
    type Item;

    fn paths(&self, item: &Self::Item) -> Vec<String>;
}

/// Paths that a purge of `items` would carry: flattened, deduplicated in
/// first-seen order, with [`ROOT_PATH`] removed.
pub fn purge_targets<G>(generator: &G, items: &[G::Item]) -> Vec<String>
where
    G: PathGenerator + ?Sized,
{
    let mut seen = HashSet::new();
    items
        .iter()
        .flat_map(|item| generator.paths(item))
        .filter(|path| path != ROOT_PATH)
        .filter(|path| seen.insert(path.clone()))
        .collect()
}

/// Sends purge requests for changed content to the configured CDN endpoint.
pub struct PurgeDispatcher<G> {
    generator: G,
    settings: CdnSettings,
    credentials: Arc<dyn CredentialProvider>,
    http: Client,
    remote: OnceCell<CdnManagementClient>,
}

impl<G> PurgeDispatcher<G>
where
    G: PathGenerator,
{
    /// Dispatcher authenticating with the client credentials grant.
    pub fn new(generator: G, settings: CdnSettings) -> Result<Self, InfraError> {
        let http = Client::builder().user_agent(user_agent()).build()?;
        let credentials = Arc::new(ClientCredentialsProvider::with_client(http.clone()));
        Ok(Self::with_parts(generator, settings, credentials, http))
    }

    /// Validate raw settings and build a dispatcher; blank required values fail here.
    pub fn from_raw(generator: G, raw: RawCdnSettings) -> Result<Self, PurgeSetupError> {
        let settings = CdnSettings::from_raw(raw)?;
        Ok(Self::new(generator, settings)?)
    }

    /// Dispatcher with an injected credential source and HTTP client.
    pub fn with_parts(
        generator: G,
        settings: CdnSettings,
        credentials: Arc<dyn CredentialProvider>,
        http: Client,
    ) -> Self {
        Self {
            generator,
            settings,
            credentials,
            http,
            remote: OnceCell::new(),
        }
    }

    pub fn settings(&self) -> &CdnSettings {
        &self.settings
    }

    /// Whether the management client has been created yet.
    pub fn is_connected(&self) -> bool {
        self.remote.initialized()
    }

    /// Purge the public copies of `items`.
    ///
    /// An empty `items` returns at once without touching the network. Any
    /// other input issues exactly one purge request, even when every path
    /// was filtered out and the list is empty.
    pub async fn purge(&self, items: &[G::Item]) -> Result<(), InfraError> {
        if items.is_empty() {
            debug!(target = "soffio::cdn_purge", "Nothing to purge");
            return Ok(());
        }

        let paths = purge_targets(&self.generator, items);
        debug!(
            target = "soffio::cdn_purge",
            items = items.len(),
            paths = ?paths,
            "Computed purge targets"
        );

        let result = self.dispatch(&paths).await;
        metrics::counter!(PURGE_REQUESTS_TOTAL).increment(1);
        if let Err(err) = &result {
            metrics::counter!(PURGE_FAILURES_TOTAL).increment(1);
            warn!(
                target = "soffio::cdn_purge",
                endpoint = self.settings.endpoint(),
                error = %err,
                "Purge failed"
            );
        }
        result
    }

    async fn dispatch(&self, paths: &[String]) -> Result<(), InfraError> {
        let remote = self.remote().await?;
        metrics::histogram!(PURGE_PATHS).record(paths.len() as f64);

        info!(
            target = "soffio::cdn_purge",
            resource_group = self.settings.resource_group(),
            profile = self.settings.profile(),
            endpoint = self.settings.endpoint(),
            paths = paths.len(),
            "Dispatching purge"
        );

        let target = EndpointRef {
            resource_group: self.settings.resource_group(),
            profile: self.settings.profile(),
            endpoint: self.settings.endpoint(),
        };
        remote.purge_content(target, paths).await
    }

    /// Management client, created on first use. Concurrent first callers
    /// share a single initialization; a failed one leaves the slot empty.
    async fn remote(&self) -> Result<&CdnManagementClient, InfraError> {
        self.remote
            .get_or_try_init(|| async {
                let request = TokenRequest {
                    authority: self.settings.authority(),
                    client_id: self.settings.client_id(),
                    client_secret: self.settings.client_secret(),
                    resource: self.settings.resource(),
                };
                let token = self.credentials.acquire_token(request).await?;
                info!(
                    target = "soffio::cdn_purge",
                    subscription_id = self.settings.subscription_id(),
                    expires_in = ?token.expires_in(),
                    "Acquired management token"
                );

                Ok::<_, InfraError>(CdnManagementClient::new(
                    self.http.clone(),
                    self.settings.management_url().clone(),
                    self.settings.subscription_id(),
                    self.settings.api_version(),
                    token,
                ))
            })
            .await
    }
}

/// Failure to build a dispatcher from raw configuration.
#[derive(Debug, thiserror::Error)]
pub enum PurgeSetupError {
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error(transparent)]
    Infra(#[from] InfraError),
}
