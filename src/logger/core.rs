/// Core logging implementation with automatic filtering
use super::config::{get_logger_config, is_debug_enabled_for_tag};
use super::levels::LogLevel;
use super::tags::LogTag;

/// Check if a log message should be displayed
///
/// Filtering rules:
/// 1. Errors are always shown
/// 2. Debug requires --debug-<tag> (or --verbose)
/// 3. Verbose requires --verbose
/// 4. Everything else is compared against the minimum level
pub fn should_log(tag: &LogTag, level: LogLevel) -> bool {
    if level == LogLevel::Error {
        return true;
    }

    let config = get_logger_config();

    match level {
        LogLevel::Debug => is_debug_enabled_for_tag(tag),
        LogLevel::Verbose => config.min_level == LogLevel::Verbose,
        _ => level <= config.min_level,
    }
}

/// Internal logging function with automatic filtering
pub fn log_internal(tag: LogTag, level: LogLevel, message: &str) {
    if !should_log(&tag, level) {
        return;
    }

    super::format::format_and_log(tag, level, message);
}
