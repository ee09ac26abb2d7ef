use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

pub(crate) const PURGE_REQUESTS_TOTAL: &str = "soffio_cdn_purge_requests_total";
pub(crate) const PURGE_FAILURES_TOTAL: &str = "soffio_cdn_purge_failures_total";
pub(crate) const PURGE_PATHS: &str = "soffio_cdn_purge_paths";

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            PURGE_REQUESTS_TOTAL,
            Unit::Count,
            "Total number of purge requests dispatched to the CDN."
        );
        describe_counter!(
            PURGE_FAILURES_TOTAL,
            Unit::Count,
            "Total number of purge requests that failed to authenticate or dispatch."
        );
        describe_histogram!(
            PURGE_PATHS,
            Unit::Count,
            "Number of content paths carried by each purge request."
        );
    });
}
