use crate::domain::LogRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SerializationError {
    #[error("JSON serialization failed: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// One entry of a submission request: the record's compact JSON plus the
/// moment it was taken off the queue, in epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    pub timestamp: i64,
    pub message: String,
}

/// Encodes records one at a time, so a single bad record never spoils a batch.
#[derive(Debug, Clone, Default)]
pub struct RecordSerializer;

impl RecordSerializer {
    pub fn new() -> Self {
        Self
    }

    pub fn to_json(&self, record: &LogRecord) -> Result<String, SerializationError> {
        Ok(serde_json::to_string(record)?)
    }

    /// Encodes `record`, stamping the entry with `dequeued_at` rather than the
    /// record's own timestamp.
    pub fn encode(
        &self,
        record: &LogRecord,
        dequeued_at: DateTime<Utc>,
    ) -> Result<LogEvent, SerializationError> {
        Ok(LogEvent {
            timestamp: dequeued_at.timestamp_millis(),
            message: self.to_json(record)?,
        })
    }
}
