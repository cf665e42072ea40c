//! Centralized logging configuration for the emulator core.
//!
//! Log output from the hot path has to be free when it is off, so the
//! configuration is a set of process-wide atomics and every call site hands
//! `log()` a closure that is only evaluated once the level check has
//! passed. Messages go to stderr; a frontend that wants files can capture
//! the stream itself.
//!
//! # Usage
//!
//! ```rust
//! use emu_core::logging::{log, LogCategory, LogLevel};
//!
//! log(LogCategory::Disk, LogLevel::Debug, || {
//!     format!("drive 1 stepped to track {}", 17)
//! });
//! ```

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;

/// Log level for controlling verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    /// Parse a log level from a string (case-insensitive).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "off" | "0" => Some(LogLevel::Off),
            "error" | "err" | "1" => Some(LogLevel::Error),
            "warn" | "warning" | "2" => Some(LogLevel::Warn),
            "info" | "3" => Some(LogLevel::Info),
            "debug" | "4" => Some(LogLevel::Debug),
            "trace" | "5" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            5 => LogLevel::Trace,
            _ => LogLevel::Off,
        }
    }
}

/// Log category for the emulator components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogCategory {
    /// CPU execution (invalid opcodes, batch stops)
    Cpu,
    /// Address-space traffic and hook dispatch
    Bus,
    /// Disk controller and codec
    Disk,
    /// Soft-switch state changes (keyboard, bank switching)
    SoftSwitch,
    /// Unimplemented features
    Stubs,
}

impl LogCategory {
    const ALL: [LogCategory; 5] = [
        LogCategory::Cpu,
        LogCategory::Bus,
        LogCategory::Disk,
        LogCategory::SoftSwitch,
        LogCategory::Stubs,
    ];

    fn index(self) -> usize {
        match self {
            LogCategory::Cpu => 0,
            LogCategory::Bus => 1,
            LogCategory::Disk => 2,
            LogCategory::SoftSwitch => 3,
            LogCategory::Stubs => 4,
        }
    }

    fn label(self) -> &'static str {
        match self {
            LogCategory::Cpu => "CPU",
            LogCategory::Bus => "BUS",
            LogCategory::Disk => "DISK",
            LogCategory::SoftSwitch => "SSW",
            LogCategory::Stubs => "STUB",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "cpu" => Some(LogCategory::Cpu),
            "bus" => Some(LogCategory::Bus),
            "disk" => Some(LogCategory::Disk),
            "softswitch" | "ssw" => Some(LogCategory::SoftSwitch),
            "stubs" | "stub" => Some(LogCategory::Stubs),
            _ => None,
        }
    }
}

/// Per-category levels stored as atomics so the hot path never locks.
struct LogConfig {
    levels: [AtomicU8; 5],
}

impl LogConfig {
    fn new() -> Self {
        let config = Self {
            levels: [
                AtomicU8::new(LogLevel::Off as u8),
                AtomicU8::new(LogLevel::Off as u8),
                AtomicU8::new(LogLevel::Off as u8),
                AtomicU8::new(LogLevel::Off as u8),
                AtomicU8::new(LogLevel::Off as u8),
            ],
        };
        config.apply_env();
        config
    }

    /// Bootstrap from the environment: `EMU_LOG_LEVEL` sets every category;
    /// `EMU_LOG_CATEGORIES` (comma-separated names) then restricts which
    /// ones stay enabled.
    fn apply_env(&self) {
        let level = std::env::var("EMU_LOG_LEVEL")
            .ok()
            .and_then(|s| LogLevel::from_str(&s));
        let Some(level) = level else { return };

        let categories: Option<Vec<LogCategory>> = std::env::var("EMU_LOG_CATEGORIES")
            .ok()
            .map(|s| s.split(',').filter_map(LogCategory::from_name).collect());

        for category in LogCategory::ALL {
            let enabled = match &categories {
                Some(list) => list.contains(&category),
                None => true,
            };
            let value = if enabled { level as u8 } else { LogLevel::Off as u8 };
            self.levels[category.index()].store(value, Ordering::Relaxed);
        }
    }

    fn level(&self, category: LogCategory) -> LogLevel {
        LogLevel::from_u8(self.levels[category.index()].load(Ordering::Relaxed))
    }

    fn set_level(&self, category: LogCategory, level: LogLevel) {
        self.levels[category.index()].store(level as u8, Ordering::Relaxed);
    }
}

fn config() -> &'static LogConfig {
    static CONFIG: OnceLock<LogConfig> = OnceLock::new();
    CONFIG.get_or_init(LogConfig::new)
}

/// Set the level of one category.
pub fn set_level(category: LogCategory, level: LogLevel) {
    config().set_level(category, level);
}

/// Set every category to the same level.
pub fn set_global_level(level: LogLevel) {
    for category in LogCategory::ALL {
        config().set_level(category, level);
    }
}

/// Current level of a category.
pub fn level(category: LogCategory) -> LogLevel {
    config().level(category)
}

/// True when a message at `level` would actually be emitted.
pub fn enabled(category: LogCategory, level: LogLevel) -> bool {
    level != LogLevel::Off && level <= config().level(category)
}

/// Log with lazy evaluation: the closure runs only when the category is
/// enabled at `level`.
pub fn log<F>(category: LogCategory, level: LogLevel, message: F)
where
    F: FnOnce() -> String,
{
    if !enabled(category, level) {
        return;
    }
    let tag = match level {
        LogLevel::Off => return,
        LogLevel::Error => "ERROR",
        LogLevel::Warn => "WARN",
        LogLevel::Info => "INFO",
        LogLevel::Debug => "DEBUG",
        LogLevel::Trace => "TRACE",
    };
    eprintln!("[{}][{}] {}", tag, category.label(), message());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_parse_by_name_and_number() {
        assert_eq!(LogLevel::from_str("debug"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::from_str("WARN"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::from_str("5"), Some(LogLevel::Trace));
        assert_eq!(LogLevel::from_str("nope"), None);
    }

    #[test]
    fn levels_order_by_verbosity() {
        assert!(LogLevel::Error < LogLevel::Trace);
        assert!(LogLevel::Off < LogLevel::Error);
    }

    #[test]
    fn disabled_category_skips_message_construction() {
        set_level(LogCategory::Bus, LogLevel::Off);
        let mut evaluated = false;
        log(LogCategory::Bus, LogLevel::Debug, || {
            evaluated = true;
            String::new()
        });
        assert!(!evaluated);
    }

    #[test]
    fn enabled_respects_threshold() {
        set_level(LogCategory::Disk, LogLevel::Info);
        assert!(enabled(LogCategory::Disk, LogLevel::Error));
        assert!(enabled(LogCategory::Disk, LogLevel::Info));
        assert!(!enabled(LogCategory::Disk, LogLevel::Debug));
        set_level(LogCategory::Disk, LogLevel::Off);
    }
}
