/// Command-line argument handling for controlwire
///
/// Debug flags follow the `--debug-<tag>` convention, one per log tag,
/// so noisy subsystems can be traced individually.
use clap::Parser;
use std::path::PathBuf;

/// Default configuration file path
pub const DEFAULT_CONFIG_PATH: &str = "controlwire.toml";

#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "controlwire",
    version,
    about = "Real-time event hub for container, cluster and playbook state"
)]
pub struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Override the bind host from the config file
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// Override the bind port from the config file
    #[arg(long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Show verbose output (includes every debug tag)
    #[arg(long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only show errors
    #[arg(long)]
    pub quiet: bool,

    /// Hub registry and fan-out debug output
    #[arg(long)]
    pub debug_hub: bool,

    /// Per-client pump debug output
    #[arg(long)]
    pub debug_connection: bool,

    /// Producer loop debug output
    #[arg(long)]
    pub debug_producer: bool,

    /// Collaborator call debug output
    #[arg(long)]
    pub debug_collector: bool,

    /// HTTP server debug output
    #[arg(long)]
    pub debug_webserver: bool,

    /// Third-party crate debug output
    #[arg(long)]
    pub debug_external: bool,
}

impl Cli {
    /// Debug keys enabled by `--debug-<tag>` flags
    pub fn debug_tags(&self) -> Vec<&'static str> {
        [
            (self.debug_hub, "hub"),
            (self.debug_connection, "connection"),
            (self.debug_producer, "producer"),
            (self.debug_collector, "collector"),
            (self.debug_webserver, "webserver"),
            (self.debug_external, "external"),
        ]
        .into_iter()
        .filter_map(|(enabled, key)| enabled.then_some(key))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["controlwire"]);
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert!(cli.host.is_none());
        assert!(cli.debug_tags().is_empty());
    }

    #[test]
    fn test_debug_flags() {
        let cli = Cli::parse_from([
            "controlwire",
            "--debug-hub",
            "--debug-producer",
            "--port",
            "9191",
        ]);
        assert_eq!(cli.debug_tags(), vec!["hub", "producer"]);
        assert_eq!(cli.port, Some(9191));
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["controlwire", "--verbose", "--quiet"]).is_err());
    }
}
