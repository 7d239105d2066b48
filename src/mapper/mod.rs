//! Turns application-side events into [`LogRecord`]s.
//!
//! Mappers are pure and total: every input yields a record.

pub mod layer;

use crate::domain::{Level, LogRecord};

pub use layer::{EventMapper, ShipperLayer};

pub trait RecordMapper<E: ?Sized> {
    fn map(&self, event: &E) -> LogRecord;
}

/// Maps one line of plain text to a record.
///
/// A leading level word (`WARN ...`, `[error] ...`, `INFO: ...`) sets the
/// level and is stripped from the message; otherwise the level is `INFO` and
/// the line is kept whole.
#[derive(Debug, Clone)]
pub struct LineMapper {
    logger_name: String,
    thread_name: String,
}

impl LineMapper {
    pub fn new(logger_name: impl Into<String>) -> Self {
        Self {
            logger_name: logger_name.into(),
            thread_name: std::thread::current()
                .name()
                .unwrap_or("main")
                .to_string(),
        }
    }

    pub fn with_thread_name(mut self, thread_name: impl Into<String>) -> Self {
        self.thread_name = thread_name.into();
        self
    }

    fn split_level(line: &str) -> (Level, &str) {
        let trimmed = line.trim_start();
        let (word, rest) = trimmed
            .split_once(char::is_whitespace)
            .unwrap_or((trimmed, ""));

        let candidate = word
            .trim_start_matches('[')
            .trim_end_matches(':')
            .trim_end_matches(']');
        match candidate.parse::<Level>() {
            Ok(level) if !candidate.is_empty() => (level, rest.trim_start()),
            _ => (Level::Info, line),
        }
    }
}

impl RecordMapper<str> for LineMapper {
    fn map(&self, line: &str) -> LogRecord {
        let line = line.trim_end_matches(['\r', '\n']);
        let (level, message) = Self::split_level(line);

        LogRecord::builder(message)
            .level(level)
            .logger_name(self.logger_name.as_str())
            .thread_name(self.thread_name.as_str())
            .build()
    }
}
