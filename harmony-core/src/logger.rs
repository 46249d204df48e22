//! Write-only logging sink.
//!
//! Framework code logs through `tracing` directly. [`Logger`] is the seam for
//! applications that want Harmony-style `log(level, tag, message)` calls
//! routed somewhere of their choosing.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Log sink. Implementations must not block the caller.
pub trait Logger: Send + Sync {
    fn log(&self, level: LogLevel, tag: Option<&str>, message: &str);

    fn info(&self, tag: Option<&str>, message: &str) {
        self.log(LogLevel::Info, tag, message);
    }

    fn warning(&self, tag: Option<&str>, message: &str) {
        self.log(LogLevel::Warning, tag, message);
    }

    fn error(&self, tag: Option<&str>, message: &str) {
        self.log(LogLevel::Error, tag, message);
    }
}

/// Forwards to the `tracing` macros, with the tag as a structured field.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, tag: Option<&str>, message: &str) {
        let tag = tag.unwrap_or("harmony");
        match level {
            LogLevel::Debug => tracing::debug!(tag, "{message}"),
            LogLevel::Info => tracing::info!(tag, "{message}"),
            LogLevel::Warning => tracing::warn!(tag, "{message}"),
            LogLevel::Error => tracing::error!(tag, "{message}"),
        }
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct VoidLogger;

impl Logger for VoidLogger {
    fn log(&self, _level: LogLevel, _tag: Option<&str>, _message: &str) {}
}
