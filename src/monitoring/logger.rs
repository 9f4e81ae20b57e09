use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

use crate::config::MonitoringConfig;

/// Dependencies that log every query or connection at `info`.
const QUIET_TARGETS: &[&str] = &["sqlx=warn", "hyper=warn", "reqwest=warn"];

/// Filter used when `RUST_LOG` is unset: the configured level, with the
/// chattiest dependencies held at `warn`.
fn default_filter(config: &MonitoringConfig) -> EnvFilter {
    let mut directives = vec![config.log_level.clone()];
    directives.extend(QUIET_TARGETS.iter().map(|t| t.to_string()));
    EnvFilter::new(directives.join(","))
}

pub fn init_logging(config: &MonitoringConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(config));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .try_init()
        .map_err(|e| anyhow!("Failed to install tracing subscriber: {e}"))
}
