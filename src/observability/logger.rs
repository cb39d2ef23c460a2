//! Structured event log
//!
//! One log line = one JSON object = one event. Output is synchronous
//! and unbuffered, key order is deterministic (`event`, `severity`,
//! then fields alphabetically), and ERROR and above go to stderr. The
//! capture layer logs enqueues, admission denials, and stalled locator
//! retries through this.

use std::fmt;
use std::io::{self, Write};

use serde_json::Value;

/// Event severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Per-operation detail
    Trace,
    /// Normal operations
    Info,
    /// Recoverable or suspicious conditions
    Warn,
    /// Operation failures
    Error,
    /// Logic errors; the enclosing operation aborts
    Fatal,
}

impl Severity {
    /// String form used in log output.
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }

    fn to_stderr(self) -> bool {
        self >= Severity::Error
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Synchronous structured logger.
pub struct Logger;

impl Logger {
    /// Logs one event with its fields.
    pub fn log(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        if severity.to_stderr() {
            Self::write_event(severity, event, fields, &mut io::stderr());
        } else {
            Self::write_event(severity, event, fields, &mut io::stdout());
        }
    }

    /// Logs at TRACE.
    pub fn trace(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Trace, event, fields);
    }

    /// Logs at INFO.
    pub fn info(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Info, event, fields);
    }

    /// Logs at WARN.
    pub fn warn(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Warn, event, fields);
    }

    /// Logs at ERROR.
    pub fn error(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Error, event, fields);
    }

    /// Logs at FATAL.
    pub fn fatal(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Fatal, event, fields);
    }

    fn write_event<W: Write>(
        severity: Severity,
        event: &str,
        fields: &[(&str, &str)],
        writer: &mut W,
    ) {
        let line = Self::render(severity, event, fields);
        // One write, one flush: a line is never interleaved or delayed.
        let _ = writer.write_all(line.as_bytes());
        let _ = writer.flush();
    }

    /// Renders the event as one JSON line. JSON string escaping is
    /// delegated to the serializer.
    fn render(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
        let mut ordered: Vec<&(&str, &str)> = fields.iter().collect();
        ordered.sort_by_key(|(key, _)| *key);

        let mut line = String::with_capacity(128);
        line.push_str("{\"event\":");
        line.push_str(&Value::from(event).to_string());
        line.push_str(",\"severity\":");
        line.push_str(&Value::from(severity.as_str()).to_string());
        for (key, value) in ordered {
            line.push(',');
            line.push_str(&Value::from(*key).to_string());
            line.push(':');
            line.push_str(&Value::from(*value).to_string());
        }
        line.push_str("}\n");
        line
    }
}
