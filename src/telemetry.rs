//! Tracing initialization (EnvFilter + fmt subscriber).
//!
//! Security events additionally flow through the audit log (see
//! [`crate::audit`]); this module only wires up the operational console
//! output. Filtering follows the standard `RUST_LOG` conventions.

use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialize tracing with console output.
///
/// Defaults to `info` when `RUST_LOG` is not set.
pub fn init_telemetry() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    info!("Telemetry initialized");
    Ok(())
}
