//! Tracing bootstrap shared by the server and CLI binaries.

use anyhow::Context;
use readshelf_kernel::settings::{LogFormat, TelemetrySettings};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Build the filter: `RUST_LOG` wins over the configured directive.
fn env_filter(settings: &TelemetrySettings) -> anyhow::Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&settings.log_filter)
            .with_context(|| format!("invalid log filter '{}'", settings.log_filter)),
    }
}

/// Install the global tracing subscriber.
///
/// Returns an error if the filter is invalid. A subscriber that is already
/// installed (tests, embedding) is left in place.
pub fn init(settings: &TelemetrySettings) -> anyhow::Result<()> {
    let filter = env_filter(settings)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match settings.log_format {
        LogFormat::Pretty => registry.with(fmt::layer().with_target(true)).try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init(),
    };

    if installed.is_err() {
        tracing::debug!(target: "readshelf-telemetry", "subscriber already installed");
        return Ok(());
    }

    tracing::info!(
        target: "readshelf-telemetry",
        format = ?settings.log_format,
        filter = %settings.log_filter,
        "telemetry initialized"
    );
    Ok(())
}
