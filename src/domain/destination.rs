use super::log_record::format_timestamp;
use chrono::{DateTime, Utc};
use std::fmt;

/// Characters the remote service refuses in stream names.
const ILLEGAL_STREAM_CHARS: [char; 2] = [':', '*'];

/// Replaces every character the remote naming scheme rejects with `.`.
pub fn sanitize_stream_name(name: &str) -> String {
    name.chars()
        .map(|c| if ILLEGAL_STREAM_CHARS.contains(&c) { '.' } else { c })
        .collect()
}

/// Where a started shipper writes: resolved once per start, immutable after.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    group: String,
    stream: String,
    region: String,
}

impl Destination {
    pub fn new(
        group: impl Into<String>,
        stream: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            stream: stream.into(),
            region: region.into(),
        }
    }

    /// Resolves the destination, deriving the stream name from `now` and
    /// `host` when none is configured.
    pub fn resolve(
        group: &str,
        stream: Option<&str>,
        region: &str,
        now: DateTime<Utc>,
        host: Option<&str>,
    ) -> Self {
        let stream = match stream {
            Some(stream) => stream.to_string(),
            None => Self::default_stream_name(now, host),
        };
        Self::new(group, stream, region)
    }

    /// `<yyyy-MM-dd HH:mm:ss.SSS> <host>`, sanitized.
    pub fn default_stream_name(now: DateTime<Utc>, host: Option<&str>) -> String {
        let stamp = format_timestamp(&now);
        let raw = match host {
            Some(host) if !host.is_empty() => format!("{stamp} {host}"),
            _ => stamp,
        };
        sanitize_stream_name(&raw)
    }

    /// Local hostname, if it can be read and is valid UTF-8.
    pub fn local_hostname() -> Option<String> {
        hostname::get()
            .ok()
            .and_then(|name| name.into_string().ok())
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({})", self.group, self.stream, self.region)
    }
}
