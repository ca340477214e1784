use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::cache::{
    METRIC_POPULAR_ENTRIES, METRIC_RANKING_UNAVAILABLE, METRIC_REBUILD_FAILED, METRIC_REBUILD_MS,
    METRIC_REBUILD_TOTAL, METRIC_VISITS_RECORDED,
};
use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
///
/// `RUST_LOG` directives, when present, refine the configured level.
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

/// Register metric descriptions with the installed recorder. Runs once per process.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_VISITS_RECORDED,
            Unit::Count,
            "Total number of post visits written to the ranking."
        );
        describe_counter!(
            METRIC_RANKING_UNAVAILABLE,
            Unit::Count,
            "Total number of ranking operations that failed because the store was unreachable."
        );
        describe_counter!(
            METRIC_REBUILD_TOTAL,
            Unit::Count,
            "Total number of popular cache rebuilds started."
        );
        describe_counter!(
            METRIC_REBUILD_FAILED,
            Unit::Count,
            "Total number of popular cache rebuilds that returned an error."
        );
        describe_histogram!(
            METRIC_REBUILD_MS,
            Unit::Milliseconds,
            "Popular cache rebuild latency in milliseconds."
        );
        describe_gauge!(
            METRIC_POPULAR_ENTRIES,
            Unit::Count,
            "Number of posts held by the popular cache after the last rebuild."
        );
    });
}
