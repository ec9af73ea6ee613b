//! # Logging
//!
//! `tracing` subscriber setup. `RUST_LOG` wins when set; otherwise the
//! configured level applies to this crate only.

use crate::config::ControllerConfig;
use tracing_subscriber::EnvFilter;

fn default_filter(config: &ControllerConfig) -> String {
    format!(
        "media_config_controller={}",
        config.log_level.to_lowercase()
    )
}

/// Install the global subscriber. JSON unless `LOG_FORMAT` is `text`.
pub fn init_tracing(config: &ControllerConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(config)));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if config.log_format.eq_ignore_ascii_case("text") {
        builder.try_init()
    } else {
        builder.json().with_current_span(true).try_init()
    };
    result.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_targets_crate() {
        let config = ControllerConfig {
            log_level: "DEBUG".into(),
            ..ControllerConfig::default()
        };
        assert_eq!(default_filter(&config), "media_config_controller=debug");
    }
}
