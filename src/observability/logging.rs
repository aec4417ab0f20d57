use crate::event::Event;
use crate::event::EventKind;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use thiserror::Error;

/// Severity levels for dynamic log-level overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Canonical uppercase representation.
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    fn severity(self) -> u8 {
        match self {
            LogLevel::Trace => 0,
            LogLevel::Debug => 1,
            LogLevel::Info => 2,
            LogLevel::Warn => 3,
            LogLevel::Error => 4,
        }
    }

    /// Whether a record at this level passes a `min` threshold.
    pub fn passes(self, min: LogLevel) -> bool {
        self.severity() >= min.severity()
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ledger correlation carried by records that describe a committed event, so
/// a log line can be joined back to the event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LedgerRef {
    pub sequence: u64,
    pub kind: EventKind,
    pub resulting_value: i64,
}

impl From<&Event> for LedgerRef {
    fn from(event: &Event) -> Self {
        Self {
            sequence: event.sequence_number,
            kind: event.kind,
            resulting_value: event.resulting_value,
        }
    }
}

/// JSON-line activity log with bounded retention: the newest `capacity`
/// lines are kept and older ones are evicted, with an eviction counter in
/// place of the dropped text.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    min_level: LogLevel,
    capacity: usize,
    lines: VecDeque<String>,
    evicted: u64,
}

impl ActivityLog {
    /// Creates a log retaining at most `capacity` lines.
    pub fn new(capacity: usize) -> Self {
        Self {
            min_level: LogLevel::Info,
            capacity: capacity.max(1),
            lines: VecDeque::new(),
            evicted: 0,
        }
    }

    /// Current minimum level.
    pub fn level(&self) -> LogLevel {
        self.min_level
    }

    /// Applies a dynamic log-level override.
    pub fn set_level(&mut self, level: LogLevel) {
        self.min_level = level;
    }

    /// Emits a record with no ledger correlation (startup, config, polling).
    pub fn record(
        &mut self,
        ts_ms: u64,
        level: LogLevel,
        component: &str,
        message: &str,
    ) -> Result<(), LoggingError> {
        self.push(ts_ms, level, component, None, None, message)
    }

    /// Emits a record describing a committed event, embedding the ledger
    /// reference and the acting identity.
    pub fn record_event(
        &mut self,
        ts_ms: u64,
        level: LogLevel,
        component: &str,
        event: &Event,
        message: &str,
    ) -> Result<(), LoggingError> {
        self.push(
            ts_ms,
            level,
            component,
            Some(LedgerRef::from(event)),
            Some(event.actor.as_str()),
            message,
        )
    }

    /// Retained lines, oldest first.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Lines evicted to honor the retention cap.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    fn push(
        &mut self,
        ts_ms: u64,
        level: LogLevel,
        component: &str,
        ledger: Option<LedgerRef>,
        actor: Option<&str>,
        message: &str,
    ) -> Result<(), LoggingError> {
        if !level.passes(self.min_level) {
            return Ok(());
        }
        let record = LogRecord {
            ts: ts_ms,
            level: level.as_str(),
            component,
            ledger,
            actor,
            message,
        };
        let line = serde_json::to_string(&record).map_err(LoggingError::Serialize)?;
        while self.lines.len() >= self.capacity {
            self.lines.pop_front();
            self.evicted += 1;
        }
        self.lines.push_back(line);
        Ok(())
    }
}

/// Errors surfaced while serializing JSON-line logs.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to serialize log record: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
struct LogRecord<'a> {
    ts: u64,
    level: &'a str,
    component: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    ledger: Option<LedgerRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    actor: Option<&'a str>,
    message: &'a str,
}
