use clap::Parser;

use controlwire::{
    arguments::Cli,
    config::{apply_cli_overrides, load_config_from_path},
    logger::{self, LogTag},
    run,
};

/// Main entry point for controlwire
///
/// Parses arguments, initializes logging, loads configuration and runs
/// the server until a shutdown signal arrives.
#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logger system before anything logs
    logger::init(&cli);

    let mut config = match load_config_from_path(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            logger::error(LogTag::Config, &format!("Failed to load configuration: {}", e));
            std::process::exit(1);
        }
    };
    apply_cli_overrides(&mut config, &cli);

    if let Err(e) = run::run(config).await {
        logger::error(LogTag::System, &format!("{:#}", e));
        std::process::exit(1);
    }
}
