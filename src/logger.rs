//! Structured logging for marketgate
//!
//! Tag + level based console logging with:
//! - Standard log levels (Error/Warning/Info/Debug/Verbose)
//! - Per-module debug control via --debug <module> flags
//! - Colored console output
//!
//! ## Usage
//!
//! ```rust
//! use marketgate::logger::{self, LogTag};
//!
//! logger::info(LogTag::Gateway, "Request served from cache");
//! logger::warning(LogTag::Api, "Upstream latency climbing");
//! logger::debug(LogTag::Batch, "Retry attempt 2/3"); // Only with --debug batch
//! ```

use chrono::Local;
use colored::*;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::io::{self, Write};

/// Log levels ordered by severity (Error < Warning < Info < Debug < Verbose)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error = 0,
    Warning = 1,
    Info = 2,
    Debug = 3,
    Verbose = 4,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warning => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Verbose => "VERBOSE",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Subsystem tags for log filtering and display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogTag {
    System,
    Gateway,
    Cache,
    Batch,
    Stream,
    Api,
    Config,
}

impl LogTag {
    /// Key used for --debug <module> flag matching
    pub fn debug_key(&self) -> &'static str {
        match self {
            LogTag::System => "system",
            LogTag::Gateway => "gateway",
            LogTag::Cache => "cache",
            LogTag::Batch => "batch",
            LogTag::Stream => "stream",
            LogTag::Api => "api",
            LogTag::Config => "config",
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            LogTag::System => "SYSTEM",
            LogTag::Gateway => "GATEWAY",
            LogTag::Cache => "CACHE",
            LogTag::Batch => "BATCH",
            LogTag::Stream => "STREAM",
            LogTag::Api => "API",
            LogTag::Config => "CONFIG",
        }
    }
}

/// Runtime logger configuration
#[derive(Debug, Clone, Default)]
pub struct LoggerConfig {
    pub min_level_verbose: bool,
    pub debug_modules: HashSet<String>,
}

static LOGGER_CONFIG: Lazy<RwLock<LoggerConfig>> = Lazy::new(|| RwLock::new(LoggerConfig::default()));

/// Initialize the logger from parsed CLI flags
///
/// Call once at startup, before any logging occurs.
pub fn init(verbose: bool, debug_modules: &[String]) {
    let mut config = LOGGER_CONFIG.write();
    config.min_level_verbose = verbose;
    config.debug_modules = debug_modules.iter().map(|m| m.to_lowercase()).collect();
}

fn should_log(tag: LogTag, level: LogLevel) -> bool {
    // Errors always log
    if level == LogLevel::Error {
        return true;
    }

    let config = LOGGER_CONFIG.read();

    match level {
        LogLevel::Verbose => config.min_level_verbose,
        LogLevel::Debug => {
            config.min_level_verbose || config.debug_modules.contains(tag.debug_key())
        }
        _ => true,
    }
}

const TAG_WIDTH: usize = 8;
const LEVEL_WIDTH: usize = 7;

fn format_tag(tag: LogTag) -> ColoredString {
    let padded = format!("{:<width$}", tag.as_str(), width = TAG_WIDTH);
    match tag {
        LogTag::System => padded.bright_yellow().bold(),
        LogTag::Gateway => padded.bright_green().bold(),
        LogTag::Cache => padded.bright_blue().bold(),
        LogTag::Batch => padded.bright_cyan().bold(),
        LogTag::Stream => padded.bright_magenta().bold(),
        LogTag::Api => padded.bright_white().bold(),
        LogTag::Config => padded.bright_black().bold(),
    }
}

fn format_level(level: LogLevel) -> ColoredString {
    let padded = format!("{:<width$}", level.as_str(), width = LEVEL_WIDTH);
    match level {
        LogLevel::Error => padded.red().bold(),
        LogLevel::Warning => padded.yellow(),
        LogLevel::Info => padded.green(),
        LogLevel::Debug => padded.cyan(),
        LogLevel::Verbose => padded.dimmed(),
    }
}

fn log_internal(tag: LogTag, level: LogLevel, message: &str) {
    if !should_log(tag, level) {
        return;
    }

    let time = Local::now().format("%H:%M:%S").to_string();
    let line = format!(
        "{} [{}] [{}] {}",
        time.dimmed(),
        format_tag(tag),
        format_level(level),
        message
    );

    // Tolerate broken pipes when output is piped into head/grep
    let mut stdout = io::stdout();
    let _ = writeln!(stdout, "{}", line);
    let _ = stdout.flush();
}

/// Log at ERROR level (always shown)
pub fn error(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Error, message);
}

/// Log at WARNING level
pub fn warning(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Warning, message);
}

/// Log at INFO level (standard operations)
pub fn info(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Info, message);
}

/// Log at DEBUG level (gated by --debug <module>)
pub fn debug(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Debug, message);
}

/// Log at VERBOSE level (gated by --verbose)
pub fn verbose(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Verbose, message);
}

#[cfg(test)]
mod tests {
    use super::*;

    // Single test because the logger config is process-global
    #[test]
    fn filtering_rules() {
        init(false, &["batch".to_string()]);
        assert!(should_log(LogTag::Batch, LogLevel::Debug));
        assert!(!should_log(LogTag::Cache, LogLevel::Debug));
        assert!(!should_log(LogTag::Stream, LogLevel::Verbose));
        // Errors always pass
        assert!(should_log(LogTag::Cache, LogLevel::Error));

        init(true, &[]);
        assert!(should_log(LogTag::Stream, LogLevel::Verbose));
        assert!(should_log(LogTag::Api, LogLevel::Debug));
    }
}
