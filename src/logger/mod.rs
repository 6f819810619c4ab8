//! Structured logging system for controlwire
//!
//! This module provides a small, ergonomic logging API with:
//! - Standard log levels (Error/Warning/Info/Debug/Verbose)
//! - Per-subsystem debug control via --debug-<tag> flags
//! - Colored console output
//! - A `log` facade bridge for third-party crates
//!
//! ## Usage
//!
//! ```rust
//! use controlwire::logger::{self, LogTag};
//!
//! logger::error(LogTag::Hub, "Command channel closed");
//! logger::warning(LogTag::Collector, "docker ps failed, retrying next tick");
//! logger::info(LogTag::Webserver, "Listening on 127.0.0.1:9090");
//! logger::debug(LogTag::Connection, "Ping sent"); // Only if --debug-connection
//! logger::verbose(LogTag::Producer, "Raw payload: ..."); // Only if --verbose
//! ```

mod bridge;
mod config;
mod core;
mod format;
mod levels;
mod tags;

pub use config::{get_logger_config, set_logger_config, LoggerConfig};
pub use levels::LogLevel;
pub use tags::LogTag;

use crate::arguments::Cli;

/// Initialize the logger from parsed command-line flags
///
/// Call once at startup, before any services are started.
pub fn init(cli: &Cli) {
    let min_level = if cli.quiet {
        LogLevel::Error
    } else if cli.verbose {
        LogLevel::Verbose
    } else {
        LogLevel::Info
    };

    let config = LoggerConfig {
        min_level,
        debug_tags: cli.debug_tags().into_iter().collect(),
    };
    set_logger_config(config);

    bridge::install(if cli.verbose {
        LogLevel::Verbose
    } else if cli.debug_external {
        LogLevel::Debug
    } else {
        LogLevel::Info
    });
}

/// Log at ERROR level (always shown)
pub fn error(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Error, message);
}

/// Log at WARNING level (shown unless --quiet)
pub fn warning(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Warning, message);
}

/// Log at INFO level (standard operations)
pub fn info(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Info, message);
}

/// Log at DEBUG level
///
/// Only shown when the matching --debug-<tag> flag is provided.
pub fn debug(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Debug, message);
}

/// Log at VERBOSE level (only with --verbose)
pub fn verbose(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Verbose, message);
}

/// Check whether debug output is enabled for a tag
///
/// Use to skip building expensive debug messages.
pub fn is_debug_enabled(tag: LogTag) -> bool {
    config::is_debug_enabled_for_tag(&tag)
}
