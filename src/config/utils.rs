/// Configuration utilities - loading, validation and overrides
use std::path::Path;

use super::schemas::Config;
use crate::arguments::Cli;
use crate::errors::ConfigError;
use crate::logger::{self, LogTag};

/// Load configuration from a TOML file
///
/// A missing file is not an error: defaults are used and a warning is
/// logged. The result is validated before it is returned.
pub fn load_config_from_path(path: &Path) -> Result<Config, ConfigError> {
    let display = path.display().to_string();

    let config = if path.exists() {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        toml::from_str::<Config>(&contents).map_err(|source| ConfigError::Parse {
            path: display.clone(),
            source,
        })?
    } else {
        logger::warning(
            LogTag::Config,
            &format!("Config file '{}' not found, using default values", display),
        );
        Config::default()
    };

    validate_config(&config)?;

    logger::debug(
        LogTag::Config,
        &format!("Loaded configuration from '{}'", display),
    );

    Ok(config)
}

/// Apply --host/--port overrides from the command line
pub fn apply_cli_overrides(config: &mut Config, cli: &Cli) {
    if let Some(host) = &cli.host {
        config.server.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
}

/// Check invariants the runtime relies on
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let ws = &config.websocket;

    if ws.ping_interval_secs == 0 {
        return Err(invalid("websocket.ping_interval_secs", "must be positive"));
    }
    if ws.ping_interval_secs >= ws.pong_wait_secs {
        return Err(invalid(
            "websocket.ping_interval_secs",
            format!(
                "must be shorter than pong_wait_secs ({} >= {})",
                ws.ping_interval_secs, ws.pong_wait_secs
            ),
        ));
    }
    if ws.write_wait_secs == 0 {
        return Err(invalid("websocket.write_wait_secs", "must be positive"));
    }
    if ws.queue_capacity == 0 {
        return Err(invalid("websocket.queue_capacity", "must be positive"));
    }
    if ws.max_batch == 0 {
        return Err(invalid("websocket.max_batch", "must be positive"));
    }
    if ws.command_buffer == 0 {
        return Err(invalid("websocket.command_buffer", "must be positive"));
    }

    let producers = &config.producers;
    let intervals = [
        ("producers.metrics.interval_secs", producers.metrics.interval_secs),
        ("producers.docker_logs.interval_secs", producers.docker_logs.interval_secs),
        ("producers.k8s_events.interval_secs", producers.k8s_events.interval_secs),
        ("producers.ansible_exec.interval_secs", producers.ansible_exec.interval_secs),
    ];
    for (field, secs) in intervals {
        if secs == 0 {
            return Err(invalid(field, "must be positive"));
        }
    }

    if producers.ansible_exec.feed_capacity == 0 {
        return Err(invalid("producers.ansible_exec.feed_capacity", "must be positive"));
    }

    Ok(())
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}
