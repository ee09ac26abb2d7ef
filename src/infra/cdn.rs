//! CDN management API client.

use reqwest::{Client, Response, header};
use serde::Serialize;
use tracing::info;
use url::Url;

use super::{error::InfraError, identity::AccessToken};

const CDN_PROVIDER: &str = "Microsoft.Cdn";

/// Management client bound to one subscription and one access token.
///
/// The token is never refreshed; once it expires every call fails with the
/// service's authorization error.
#[derive(Debug, Clone)]
pub struct CdnManagementClient {
    client: Client,
    base: Url,
    subscription_id: String,
    api_version: String,
    token: AccessToken,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PurgeBody<'a> {
    content_paths: &'a [String],
}

/// Identifies the endpoint whose cached content is purged.
#[derive(Debug, Clone, Copy)]
pub struct EndpointRef<'a> {
    pub resource_group: &'a str,
    pub profile: &'a str,
    pub endpoint: &'a str,
}

impl CdnManagementClient {
    pub fn new(
        client: Client,
        base: Url,
        subscription_id: impl Into<String>,
        api_version: impl Into<String>,
        token: AccessToken,
    ) -> Self {
        Self {
            client,
            base,
            subscription_id: subscription_id.into(),
            api_version: api_version.into(),
            token,
        }
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    /// Ask the endpoint to evict `paths`. Any 2xx counts as accepted; the
    /// long-running purge operation itself is not awaited.
    pub async fn purge_content(
        &self,
        target: EndpointRef<'_>,
        paths: &[String],
    ) -> Result<(), InfraError> {
        let url = self.purge_url(target)?;

        let response = self
            .client
            .post(url)
            .bearer_auth(self.token.secret())
            .header(header::ACCEPT, "application/json")
            .json(&PurgeBody {
                content_paths: paths,
            })
            .send()
            .await?;

        let status = response.status();
        Self::handle(response).await?;

        info!(
            target = "soffio::cdn_purge",
            endpoint = target.endpoint,
            paths = paths.len(),
            %status,
            "Purge accepted"
        );
        Ok(())
    }

    async fn handle(response: Response) -> Result<(), InfraError> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(InfraError::remote(status, text));
        }
        Ok(())
    }

    /// `{base}/subscriptions/{sub}/resourceGroups/{rg}/providers/Microsoft.Cdn/
    /// profiles/{profile}/endpoints/{endpoint}/purge?api-version={v}`
    pub(crate) fn purge_url(&self, target: EndpointRef<'_>) -> Result<Url, InfraError> {
        let mut url = self.base.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                InfraError::configuration(format!(
                    "management URL `{}` cannot be used as a base",
                    self.base
                ))
            })?;
            segments.pop_if_empty().extend([
                "subscriptions",
                self.subscription_id.as_str(),
                "resourceGroups",
                target.resource_group,
                "providers",
                CDN_PROVIDER,
                "profiles",
                target.profile,
                "endpoints",
                target.endpoint,
                "purge",
            ]);
        }
        url.query_pairs_mut()
            .clear()
            .append_pair("api-version", &self.api_version);
        Ok(url)
    }
}
