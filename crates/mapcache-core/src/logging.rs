//! Store log bridge.
//!
//! The store reports its own diagnostics through a [`StoreLogger`], which
//! filters by a minimum [`LogWeight`] and forwards surviving lines to
//! `tracing`. Store weights are coarser than `tracing` levels at the low end
//! and finer at the high end, so trace and debug both land on `debug` and
//! fatal lands on `error`.

use std::fmt;
use std::str::FromStr;

/// Severity of a store log line, ordered from most to least verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum LogWeight {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Fatal,
    /// Suppresses all output.
    Off,
}

impl LogWeight {
    /// Lowercase name of the weight.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogWeight::Trace => "trace",
            LogWeight::Debug => "debug",
            LogWeight::Info => "info",
            LogWeight::Warn => "warn",
            LogWeight::Error => "error",
            LogWeight::Fatal => "fatal",
            LogWeight::Off => "off",
        }
    }

    /// The `tracing` level a line of this weight is emitted at.
    ///
    /// Returns `None` for [`LogWeight::Off`].
    pub fn tracing_level(&self) -> Option<tracing::Level> {
        match self {
            LogWeight::Trace | LogWeight::Debug => Some(tracing::Level::DEBUG),
            LogWeight::Info => Some(tracing::Level::INFO),
            LogWeight::Warn => Some(tracing::Level::WARN),
            LogWeight::Error | LogWeight::Fatal => Some(tracing::Level::ERROR),
            LogWeight::Off => None,
        }
    }
}

impl fmt::Display for LogWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogWeight {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(LogWeight::Trace),
            "debug" => Ok(LogWeight::Debug),
            "info" => Ok(LogWeight::Info),
            "warn" | "warning" => Ok(LogWeight::Warn),
            "error" => Ok(LogWeight::Error),
            "fatal" => Ok(LogWeight::Fatal),
            "off" => Ok(LogWeight::Off),
            other => Err(format!("unknown log weight: {}", other)),
        }
    }
}

/// Forwards store diagnostics to `tracing`.
#[derive(Debug, Clone)]
pub struct StoreLogger {
    min: LogWeight,
    source: String,
}

impl StoreLogger {
    /// Create a logger for the named store member.
    pub fn new(source: impl Into<String>, min: LogWeight) -> Self {
        Self {
            min,
            source: source.into(),
        }
    }

    /// Minimum weight that is emitted.
    pub fn min_weight(&self) -> LogWeight {
        self.min
    }

    /// Check whether a line of the given weight would be emitted.
    pub fn enabled(&self, weight: LogWeight) -> bool {
        self.min != LogWeight::Off && weight != LogWeight::Off && weight >= self.min
    }

    /// Emit a line. The message is only formatted when the weight passes.
    pub fn log<F>(&self, weight: LogWeight, message: F)
    where
        F: FnOnce() -> String,
    {
        if !self.enabled(weight) {
            return;
        }
        let message = message();
        let source = self.source.as_str();
        let name = weight.as_str();
        // tracing macros need a constant level
        match weight {
            LogWeight::Trace | LogWeight::Debug => {
                tracing::debug!(source, weight = name, "{}", message)
            }
            LogWeight::Info => tracing::info!(source, weight = name, "{}", message),
            LogWeight::Warn => tracing::warn!(source, weight = name, "{}", message),
            LogWeight::Error | LogWeight::Fatal => {
                tracing::error!(source, weight = name, "{}", message)
            }
            LogWeight::Off => {}
        }
    }

    pub fn debug<F: FnOnce() -> String>(&self, message: F) {
        self.log(LogWeight::Debug, message)
    }

    pub fn info<F: FnOnce() -> String>(&self, message: F) {
        self.log(LogWeight::Info, message)
    }

    pub fn warn<F: FnOnce() -> String>(&self, message: F) {
        self.log(LogWeight::Warn, message)
    }
}
