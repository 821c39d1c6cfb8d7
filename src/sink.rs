//! Logging back-end seam: named channels, leveled events, and the two sinks shipped here.

use std::collections::HashMap;
use std::fmt::{self, Write};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

/// Logical log channels, each mapped to its own `tracing` target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Channel {
    /// Every call that returns, except cursor calls
    Audit,
    /// Cursor calls; high volume, so routed apart from `Audit`
    ResultSet,
    /// Reconstructed SQL only
    SqlOnly,
    /// SQL plus elapsed time
    SqlTiming,
    /// Connection open/close and open-connection dumps
    Connection,
    /// Setup and internal diagnostics
    Setup,
}

pub const AUDIT_TARGET: &str = "sql_spy::audit";
pub const RESULTSET_TARGET: &str = "sql_spy::resultset";
pub const SQLONLY_TARGET: &str = "sql_spy::sqlonly";
pub const SQLTIMING_TARGET: &str = "sql_spy::sqltiming";
pub const CONNECTION_TARGET: &str = "sql_spy::connection";
pub const SETUP_TARGET: &str = "sql_spy::setup";

impl Channel {
    pub const ALL: [Channel; 6] = [
        Channel::Audit,
        Channel::ResultSet,
        Channel::SqlOnly,
        Channel::SqlTiming,
        Channel::Connection,
        Channel::Setup,
    ];

    #[must_use]
    pub fn target(self) -> &'static str {
        match self {
            Channel::Audit => AUDIT_TARGET,
            Channel::ResultSet => RESULTSET_TARGET,
            Channel::SqlOnly => SQLONLY_TARGET,
            Channel::SqlTiming => SQLTIMING_TARGET,
            Channel::Connection => CONNECTION_TARGET,
            Channel::Setup => SETUP_TARGET,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.target())
    }
}

/// Log level, ordered from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Severity {
    Error,
    Warn,
    Info,
    Debug,
}

impl From<Severity> for tracing::Level {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Error => tracing::Level::ERROR,
            Severity::Warn => tracing::Level::WARN,
            Severity::Info => tracing::Level::INFO,
            Severity::Debug => tracing::Level::DEBUG,
        }
    }
}

/// One rendered log line bound for a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub channel: Channel,
    pub severity: Severity,
    pub message: String,
    /// Rendered error attached to the line, if any
    pub error: Option<String>,
}

impl LogEvent {
    #[must_use]
    pub fn new(channel: Channel, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            channel,
            severity,
            message: message.into(),
            error: None,
        }
    }

    #[must_use]
    pub fn with_error(mut self, error: impl fmt::Display) -> Self {
        let mut text = String::new();
        if write!(text, "{error}").is_err() {
            text = "<unprintable error>".to_string();
        }
        self.error = Some(text);
        self
    }
}

/// Where the router sends rendered events.
///
/// `enabled` answers the per-channel level cascade the router uses to choose how much detail
/// to render; `log` must not fail.
pub trait LogSink: Send + Sync {
    fn enabled(&self, channel: Channel, severity: Severity) -> bool;

    fn log(&self, event: &LogEvent);
}

macro_rules! enabled_at {
    ($target:expr, $severity:expr) => {
        match $severity {
            Severity::Error => tracing::enabled!(target: $target, tracing::Level::ERROR),
            Severity::Warn => tracing::enabled!(target: $target, tracing::Level::WARN),
            Severity::Info => tracing::enabled!(target: $target, tracing::Level::INFO),
            Severity::Debug => tracing::enabled!(target: $target, tracing::Level::DEBUG),
        }
    };
}

macro_rules! event_at {
    ($target:expr, $severity:expr, $($arg:tt)+) => {
        match $severity {
            Severity::Error => tracing::error!(target: $target, $($arg)+),
            Severity::Warn => tracing::warn!(target: $target, $($arg)+),
            Severity::Info => tracing::info!(target: $target, $($arg)+),
            Severity::Debug => tracing::debug!(target: $target, $($arg)+),
        }
    };
}

macro_rules! emit {
    ($target:expr, $event:expr) => {
        match &$event.error {
            Some(err) => event_at!($target, $event.severity, error = %err, "{}", $event.message),
            None => event_at!($target, $event.severity, "{}", $event.message),
        }
    };
}

/// Production sink: one `tracing` target per channel, filtered by whatever subscriber the
/// application installed (e.g. `RUST_LOG=sql_spy::sqltiming=info`).
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn enabled(&self, channel: Channel, severity: Severity) -> bool {
        match channel {
            Channel::Audit => enabled_at!(AUDIT_TARGET, severity),
            Channel::ResultSet => enabled_at!(RESULTSET_TARGET, severity),
            Channel::SqlOnly => enabled_at!(SQLONLY_TARGET, severity),
            Channel::SqlTiming => enabled_at!(SQLTIMING_TARGET, severity),
            Channel::Connection => enabled_at!(CONNECTION_TARGET, severity),
            Channel::Setup => enabled_at!(SETUP_TARGET, severity),
        }
    }

    fn log(&self, event: &LogEvent) {
        match event.channel {
            Channel::Audit => emit!(AUDIT_TARGET, event),
            Channel::ResultSet => emit!(RESULTSET_TARGET, event),
            Channel::SqlOnly => emit!(SQLONLY_TARGET, event),
            Channel::SqlTiming => emit!(SQLTIMING_TARGET, event),
            Channel::Connection => emit!(CONNECTION_TARGET, event),
            Channel::Setup => emit!(SETUP_TARGET, event),
        }
    }
}

/// In-memory sink with per-channel levels; handy for tests and for embedding.
#[derive(Debug)]
pub struct RecordingSink {
    default_level: Option<Severity>,
    levels: HashMap<Channel, Option<Severity>>,
    events: Mutex<Vec<LogEvent>>,
}

impl RecordingSink {
    /// Accept everything up to and including `level` on every channel.
    #[must_use]
    pub fn new(level: Severity) -> Self {
        Self {
            default_level: Some(level),
            levels: HashMap::new(),
            events: Mutex::new(Vec::new()),
        }
    }

    /// Override one channel's level; `None` turns the channel off.
    #[must_use]
    pub fn with_channel(mut self, channel: Channel, level: Option<Severity>) -> Self {
        self.levels.insert(channel, level);
        self
    }

    #[must_use]
    pub fn events(&self) -> Vec<LogEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Messages recorded on one channel, in order.
    #[must_use]
    pub fn messages(&self, channel: Channel) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|e| e.channel == channel)
            .map(|e| e.message)
            .collect()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl LogSink for RecordingSink {
    fn enabled(&self, channel: Channel, severity: Severity) -> bool {
        let level = self
            .levels
            .get(&channel)
            .copied()
            .unwrap_or(self.default_level);
        level.is_some_and(|max| severity <= max)
    }

    fn log(&self, event: &LogEvent) {
        if self.enabled(event.channel, event.severity) {
            self.events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(event.clone());
        }
    }
}
