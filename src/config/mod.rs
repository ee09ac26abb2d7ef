//! Configuration layer: typed settings with layered precedence (file → env).

use std::{fmt, path::Path, str::FromStr};

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "soffio";
const ENV_PREFIX: &str = "SOFFIO";
pub(crate) const DEFAULT_MANAGEMENT_URL: &str = "https://management.azure.com/";
pub(crate) const DEFAULT_TOKEN_RESOURCE: &str = "https://management.core.windows.net/";
pub(crate) const DEFAULT_API_VERSION: &str = "2019-04-15";

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub cdn: CdnSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

/// Credentials and addressing for the CDN endpoint to purge.
///
/// Only obtainable through [`CdnSettings::from_raw`], so every instance has
/// all required values present and non-blank.
#[derive(Clone)]
pub struct CdnSettings {
    authority: Url,
    client_id: String,
    client_secret: String,
    subscription_id: String,
    resource_group: String,
    profile: String,
    endpoint: String,
    management_url: Url,
    resource: String,
    api_version: String,
}

impl CdnSettings {
    /// Validate raw values; fails on the first missing or blank required key.
    pub fn from_raw(raw: RawCdnSettings) -> Result<Self, LoadError> {
        let RawCdnSettings {
            authority,
            client_id,
            client_secret,
            subscription_id,
            resource_group,
            profile,
            endpoint,
            management_url,
            resource,
            api_version,
        } = raw;

        let authority = required(authority, "cdn.authority")?;
        let authority = parse_url(&authority, "cdn.authority")?;
        let client_id = required(client_id, "cdn.client_id")?;
        let client_secret = required(client_secret, "cdn.client_secret")?;
        let subscription_id = required(subscription_id, "cdn.subscription_id")?;
        let resource_group = required(resource_group, "cdn.resource_group")?;
        let profile = required(profile, "cdn.profile")?;
        let endpoint = required(endpoint, "cdn.endpoint")?;

        let management_url =
            non_blank(management_url).unwrap_or_else(|| DEFAULT_MANAGEMENT_URL.to_string());
        let management_url = parse_url(&management_url, "cdn.management_url")?;
        let resource = non_blank(resource).unwrap_or_else(|| DEFAULT_TOKEN_RESOURCE.to_string());
        let api_version = non_blank(api_version).unwrap_or_else(|| DEFAULT_API_VERSION.to_string());

        Ok(Self {
            authority,
            client_id,
            client_secret,
            subscription_id,
            resource_group,
            profile,
            endpoint,
            management_url,
            resource,
            api_version,
        })
    }

    pub fn authority(&self) -> &Url {
        &self.authority
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    pub fn resource_group(&self) -> &str {
        &self.resource_group
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn management_url(&self) -> &Url {
        &self.management_url
    }

    /// Resource the access token is scoped to.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }
}

impl fmt::Debug for CdnSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CdnSettings")
            .field("authority", &self.authority.as_str())
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("subscription_id", &self.subscription_id)
            .field("resource_group", &self.resource_group)
            .field("profile", &self.profile)
            .field("endpoint", &self.endpoint)
            .field("management_url", &self.management_url.as_str())
            .field("resource", &self.resource)
            .field("api_version", &self.api_version)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment).
///
/// `config_file`, when supplied, must exist and is layered above the
/// default files but below the environment.
pub fn load(config_file: Option<&Path>) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = config_file {
        builder = builder.add_source(File::from(path).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let raw: RawSettings = builder.build()?.try_deserialize()?;

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    cdn: RawCdnSettings,
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings { logging, cdn } = raw;

        let logging = build_logging_settings(logging)?;
        let cdn = CdnSettings::from_raw(cdn)?;

        Ok(Self { logging, cdn })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

/// Unvalidated CDN settings as read from files or the environment.
#[derive(Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawCdnSettings {
    pub authority: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub subscription_id: Option<String>,
    pub resource_group: Option<String>,
    pub profile: Option<String>,
    pub endpoint: Option<String>,
    pub management_url: Option<String>,
    pub resource: Option<String>,
    pub api_version: Option<String>,
}

impl fmt::Debug for RawCdnSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawCdnSettings")
            .field("authority", &self.authority)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("subscription_id", &self.subscription_id)
            .field("resource_group", &self.resource_group)
            .field("profile", &self.profile)
            .field("endpoint", &self.endpoint)
            .field("management_url", &self.management_url)
            .field("resource", &self.resource)
            .field("api_version", &self.api_version)
            .finish()
    }
}

fn required(value: Option<String>, key: &'static str) -> Result<String, LoadError> {
    non_blank(value).ok_or_else(|| LoadError::invalid(key, "value must not be empty"))
}

/// Absent and blank both read as unset.
fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn parse_url(value: &str, key: &'static str) -> Result<Url, LoadError> {
    let url = Url::parse(value)
        .map_err(|err| LoadError::invalid(key, format!("invalid URL `{value}`: {err}")))?;
    if url.cannot_be_a_base() {
        return Err(LoadError::invalid(
            key,
            format!("URL `{value}` cannot be used as a base"),
        ));
    }
    Ok(url)
}
