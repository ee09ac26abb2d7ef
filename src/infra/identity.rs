//! Access tokens for the CDN management API.
//!
//! Tokens come from the identity authority through the OAuth2 client
//! credentials grant. Nothing here caches or renews them; the purge
//! dispatcher asks once and keeps the resulting client.

use std::fmt;

use async_trait::async_trait;
use reqwest::{Client, header};
use serde::Deserialize;
use tracing::{debug, warn};
use url::{Url, form_urlencoded};

use super::error::InfraError;

const TOKEN_PATH: &str = "oauth2/token";

/// Bearer credential returned by the identity authority.
#[derive(Clone)]
pub struct AccessToken {
    secret: String,
    expires_in: Option<u64>,
}

impl AccessToken {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            expires_in: None,
        }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Lifetime in seconds as reported by the authority, if any.
    pub fn expires_in(&self) -> Option<u64> {
        self.expires_in
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Everything needed to exchange client credentials for a token.
#[derive(Clone, Copy)]
pub struct TokenRequest<'a> {
    pub authority: &'a Url,
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub resource: &'a str,
}

impl fmt::Debug for TokenRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRequest")
            .field("authority", &self.authority.as_str())
            .field("client_id", &self.client_id)
            .field("resource", &self.resource)
            .finish_non_exhaustive()
    }
}

/// Source of bearer tokens for the management API.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn acquire_token(&self, request: TokenRequest<'_>) -> Result<AccessToken, InfraError>;
}

/// Client credentials grant against `{authority}/oauth2/token`.
#[derive(Debug, Clone)]
pub struct ClientCredentialsProvider {
    client: Client,
}

impl ClientCredentialsProvider {
    pub fn new() -> Result<Self, InfraError> {
        let client = Client::builder().user_agent(user_agent()).build()?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<ExpiresIn>,
}

/// Some authorities report `expires_in` as a string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExpiresIn {
    Seconds(u64),
    Text(String),
}

impl ExpiresIn {
    fn seconds(&self) -> Option<u64> {
        match self {
            Self::Seconds(value) => Some(*value),
            Self::Text(value) => value.parse().ok(),
        }
    }
}

#[async_trait]
impl CredentialProvider for ClientCredentialsProvider {
    async fn acquire_token(&self, request: TokenRequest<'_>) -> Result<AccessToken, InfraError> {
        let url = token_url(request.authority)?;
        debug!(
            target = "soffio::cdn_purge",
            authority = %request.authority,
            client_id = request.client_id,
            "Requesting access token"
        );

        let response = self
            .client
            .post(url)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(header::ACCEPT, "application/json")
            .body(token_form(&request))
            .send()
            .await
            .map_err(|err| InfraError::authentication(format!("token request failed: {err}")))?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|err| {
            InfraError::authentication(format!("token response unreadable: {err}"))
        })?;
        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes);
            warn!(
                target = "soffio::cdn_purge",
                %status,
                "Identity authority rejected token request"
            );
            return Err(InfraError::authentication(format!("status {status} body {body}")));
        }

        let parsed: TokenResponse = serde_json::from_slice(&bytes).map_err(|err| {
            InfraError::authentication(format!("failed to parse token response: {err}"))
        })?;
        match parsed.token_type.as_deref() {
            Some(kind) if !kind.eq_ignore_ascii_case("bearer") => {
                return Err(InfraError::authentication(format!(
                    "unsupported token type `{kind}`"
                )));
            }
            _ => {}
        }

        Ok(AccessToken {
            secret: parsed.access_token,
            expires_in: parsed.expires_in.as_ref().and_then(ExpiresIn::seconds),
        })
    }
}

/// `{authority}/oauth2/token`, keeping any tenant segment on the authority.
pub(crate) fn token_url(authority: &Url) -> Result<Url, InfraError> {
    let mut base = authority.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base.join(TOKEN_PATH)?)
}

pub(crate) fn token_form(request: &TokenRequest<'_>) -> String {
    form_urlencoded::Serializer::new(String::new())
        .append_pair("grant_type", "client_credentials")
        .append_pair("client_id", request.client_id)
        .append_pair("client_secret", request.client_secret)
        .append_pair("resource", request.resource)
        .finish()
}

pub(crate) fn user_agent() -> &'static str {
    concat!("soffio-cdn-purge/", env!("CARGO_PKG_VERSION"))
}
