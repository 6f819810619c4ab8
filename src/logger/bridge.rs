//! `log` facade bridge
//!
//! tungstenite and other dependencies report through the `log` crate.
//! Their records are routed into the tagged logger under `LogTag::External`.

use super::levels::LogLevel;
use super::tags::LogTag;

struct FacadeBridge;

static BRIDGE: FacadeBridge = FacadeBridge;

impl log::Log for FacadeBridge {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        super::core::should_log(&LogTag::External, LogLevel::from(metadata.level()))
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        super::core::log_internal(
            LogTag::External,
            LogLevel::from(record.level()),
            &format!("{}: {}", record.target(), record.args()),
        );
    }

    fn flush(&self) {}
}

/// Install the bridge as the global `log` logger
///
/// Installing twice is harmless; the second attempt is ignored.
pub fn install(max_level: LogLevel) {
    if log::set_logger(&BRIDGE).is_ok() {
        log::set_max_level(match max_level {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warning => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Verbose => log::LevelFilter::Trace,
        });
    }
}
