use super::log_level::Level;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;

/// Fixed UTC pattern used for every date rendered by the batcher
/// (`yyyy-MM-dd HH:mm:ss.SSS`).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Formats a timestamp with [`TIMESTAMP_FORMAT`]. Reentrant; nothing is cached
/// between calls.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

fn serialize_timestamp<S>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(&timestamp.format(TIMESTAMP_FORMAT))
}

/// One caller-location frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerFrame {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
}

/// A link of the cause chain attached to a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CauseInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(rename = "stackTraceElements", skip_serializing_if = "Vec::is_empty")]
    pub stack_frames: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<CauseInfo>>,
}

impl CauseInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            class_name: None,
            stack_frames: Vec::new(),
            cause: None,
        }
    }

    pub fn with_class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    pub fn with_stack_frames(mut self, frames: Vec<String>) -> Self {
        self.stack_frames = frames;
        self
    }

    pub fn with_cause(mut self, cause: CauseInfo) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Builds the chain from an error and its `source()` links, outermost first.
    pub fn from_error(error: &(dyn Error + 'static)) -> Self {
        let mut messages = Vec::new();
        let mut current: Option<&(dyn Error + 'static)> = Some(error);
        while let Some(err) = current {
            messages.push(err.to_string());
            current = err.source();
        }

        let mut chain: Option<CauseInfo> = None;
        for message in messages.into_iter().rev() {
            let mut link = CauseInfo::new(message);
            link.cause = chain.map(Box::new);
            chain = Some(link);
        }
        // `messages` always holds at least the outer error
        chain.unwrap_or_else(|| CauseInfo::new(error.to_string()))
    }

    /// Number of links in the chain, this one included.
    pub fn depth(&self) -> usize {
        1 + self.cause.as_ref().map_or(0, |c| c.depth())
    }
}

/// Immutable structured log record.
///
/// Built once per log event through [`LogRecordBuilder`]. Empty strings and
/// absent or empty optional fields are left out of the serialized JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    #[serde(skip_serializing_if = "String::is_empty")]
    message: String,
    level: Level,
    #[serde(skip_serializing_if = "String::is_empty")]
    thread_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    logger_name: String,
    #[serde(rename = "throwableProxy", skip_serializing_if = "Option::is_none")]
    cause: Option<CauseInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    caller_data: Vec<CallerFrame>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    markers: BTreeSet<String>,
    #[serde(rename = "mdcPropertyMap", skip_serializing_if = "BTreeMap::is_empty")]
    context: BTreeMap<String, String>,
    #[serde(rename = "timeStamp", serialize_with = "serialize_timestamp")]
    timestamp: DateTime<Utc>,
}

impl LogRecord {
    pub fn builder(message: impl Into<String>) -> LogRecordBuilder {
        LogRecordBuilder::new(message)
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }

    pub fn logger_name(&self) -> &str {
        &self.logger_name
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn markers(&self) -> &BTreeSet<String> {
        &self.markers
    }

    pub fn context(&self) -> &BTreeMap<String, String> {
        &self.context
    }

    pub fn caller_data(&self) -> &[CallerFrame] {
        &self.caller_data
    }

    pub fn cause(&self) -> Option<&CauseInfo> {
        self.cause.as_ref()
    }
}

#[derive(Debug, Clone)]
pub struct LogRecordBuilder {
    message: String,
    level: Level,
    thread_name: String,
    logger_name: String,
    timestamp: Option<DateTime<Utc>>,
    markers: BTreeSet<String>,
    context: BTreeMap<String, String>,
    caller_data: Vec<CallerFrame>,
    cause: Option<CauseInfo>,
}

impl LogRecordBuilder {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: Level::Info,
            thread_name: String::new(),
            logger_name: String::new(),
            timestamp: None,
            markers: BTreeSet::new(),
            context: BTreeMap::new(),
            caller_data: Vec::new(),
            cause: None,
        }
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn thread_name(mut self, thread_name: impl Into<String>) -> Self {
        self.thread_name = thread_name.into();
        self
    }

    pub fn logger_name(mut self, logger_name: impl Into<String>) -> Self {
        self.logger_name = logger_name.into();
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn marker(mut self, marker: impl Into<String>) -> Self {
        self.markers.insert(marker.into());
        self
    }

    pub fn context_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn caller_frame(mut self, frame: CallerFrame) -> Self {
        self.caller_data.push(frame);
        self
    }

    pub fn cause(mut self, cause: CauseInfo) -> Self {
        self.cause = Some(cause);
        self
    }

    pub fn build(self) -> LogRecord {
        LogRecord {
            message: self.message,
            level: self.level,
            thread_name: self.thread_name,
            logger_name: self.logger_name,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            markers: self.markers,
            context: self.context,
            caller_data: self.caller_data,
            cause: self.cause,
        }
    }
}
