//! Log formatting and console output with ANSI colors
//!
//! Handles:
//! - Colorized tag and level columns
//! - Continuation lines for multi-line messages
//! - Broken pipe handling for piped commands

use super::levels::LogLevel;
use super::tags::LogTag;
use chrono::Local;
use colored::*;
use std::io::{stdout, ErrorKind, Write};

/// Log format widths for alignment
const TAG_WIDTH: usize = 10;
const LOG_TYPE_WIDTH: usize = 7;

/// Format and output a log message
pub fn format_and_log(tag: LogTag, level: LogLevel, message: &str) {
    let time = Local::now().format("%H:%M:%S").to_string();
    let prefix = format!("{} ", time).dimmed().to_string();

    let base_line = format!(
        "{}[{}] [{}] ",
        prefix,
        format_tag(&tag),
        format_log_type(level)
    );

    let mut lines = message.split('\n');
    let first = lines.next().unwrap_or_default();
    print_stdout_safe(&format!("{}{}", base_line, first));

    // Continuation lines line up under the message column
    let indent = " ".repeat(time.len() + 1 + TAG_WIDTH + LOG_TYPE_WIDTH + 6);
    for line in lines {
        print_stdout_safe(&format!("{}{}", indent, line));
    }
}

/// Format a tag with its color
fn format_tag(tag: &LogTag) -> ColoredString {
    let label = format!("{:<width$}", tag.to_plain_string(), width = TAG_WIDTH);
    match tag {
        LogTag::System => label.bright_yellow().bold(),
        LogTag::Config => label.bright_white().bold(),
        LogTag::Hub => label.bright_cyan().bold(),
        LogTag::Connection => label.bright_blue().bold(),
        LogTag::Producer => label.bright_green().bold(),
        LogTag::Collector => label.bright_magenta().bold(),
        LogTag::Webserver => label.bright_purple().bold(),
        LogTag::External => label.white().dimmed(),
    }
}

/// Format the level column with its color
fn format_log_type(level: LogLevel) -> ColoredString {
    let label = format!("{:<width$}", level.as_str(), width = LOG_TYPE_WIDTH);
    match level {
        LogLevel::Error => label.bright_red().bold(),
        LogLevel::Warning => label.bright_yellow().bold(),
        LogLevel::Info => label.bright_green(),
        LogLevel::Debug => label.bright_blue(),
        LogLevel::Verbose => label.dimmed(),
    }
}

/// Print to stdout but ignore broken pipe errors
fn print_stdout_safe(message: &str) {
    let mut out = stdout().lock();
    if let Err(e) = writeln!(out, "{}", message) {
        if e.kind() == ErrorKind::BrokenPipe {
            return;
        }
        let _ = writeln!(std::io::stderr(), "Logger stdout error: {}", e);
    }
    let _ = out.flush();
}
