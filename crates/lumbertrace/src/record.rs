// Copyright 2025-Present Lumbertrace contributors
// SPDX-License-Identifier: Apache-2.0

//! Captured log records and their wire representation.
//!
//! A [`LogRecord`] is created by a producer at capture time and never mutated.
//! The drain loop serializes each record into one text frame on the stream:
//!
//! ```text
//! {"message":"...","stacktrace":"...","logType":"Warning","time":638000000000000000}
//! ```

use serde::Serialize;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Ticks (100 ns units) between 0001-01-01T00:00:00Z and the Unix epoch.
pub const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;

const NANOS_PER_TICK: u128 = 100;

/// Severity of a captured record.
///
/// The serialized names are the ones the collector groups on; `Info` travels
/// as `"Log"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LogLevel {
    #[serde(rename = "Log")]
    Info,
    Warning,
    Error,
    Assert,
    Exception,
}

impl LogLevel {
    /// Name used for this level on the wire.
    pub fn wire_name(self) -> &'static str {
        match self {
            LogLevel::Info => "Log",
            LogLevel::Warning => "Warning",
            LogLevel::Error => "Error",
            LogLevel::Assert => "Assert",
            LogLevel::Exception => "Exception",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl From<tracing::Level> for LogLevel {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::ERROR => LogLevel::Error,
            tracing::Level::WARN => LogLevel::Warning,
            _ => LogLevel::Info,
        }
    }
}

/// A single captured log event destined for the collector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub message: String,
    pub stacktrace: String,
    pub level: LogLevel,
    pub timestamp_ticks: i64,
}

impl LogRecord {
    pub fn new(
        level: LogLevel,
        message: impl Into<String>,
        stacktrace: impl Into<String>,
        timestamp_ticks: i64,
    ) -> Self {
        LogRecord {
            message: message.into(),
            stacktrace: stacktrace.into(),
            level,
            timestamp_ticks,
        }
    }

    /// Creates a record stamped with the current wall-clock time.
    pub fn now(level: LogLevel, message: impl Into<String>, stacktrace: impl Into<String>) -> Self {
        Self::new(level, message, stacktrace, ticks_from(SystemTime::now()))
    }

    /// Serializes the record into the text frame sent on the stream.
    pub fn to_wire_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&WireRecord {
            message: &self.message,
            stacktrace: &self.stacktrace,
            log_type: self.level,
            time: self.timestamp_ticks,
        })
    }
}

#[derive(Serialize)]
struct WireRecord<'a> {
    message: &'a str,
    stacktrace: &'a str,
    #[serde(rename = "logType")]
    log_type: LogLevel,
    time: i64,
}

/// Converts a wall-clock instant into 100 ns ticks since 0001-01-01 UTC.
pub fn ticks_from(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(since) => {
            let ticks = since.as_nanos() / NANOS_PER_TICK;
            UNIX_EPOCH_TICKS.saturating_add(i64::try_from(ticks).unwrap_or(i64::MAX))
        }
        Err(before) => {
            let ticks = before.duration().as_nanos() / NANOS_PER_TICK;
            UNIX_EPOCH_TICKS.saturating_sub(i64::try_from(ticks).unwrap_or(i64::MAX))
        }
    }
}
