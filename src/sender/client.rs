use super::serialization::LogEvent;
use crate::domain::Destination;
use std::fmt;
use std::future::Future;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeliveryError {
    /// The service expected a different continuation token.
    #[error("Sequence token mismatch (expected {expected})")]
    SequenceConflict { expected: ContinuationToken },
    /// The batch had already been accepted under another token.
    #[error("Batch already accepted (expected {expected})")]
    AlreadyAccepted { expected: ContinuationToken },
    #[error("Service error {code}: {message}")]
    Service { code: String, message: String },
    #[error("HTTP error: {status} - {message}")]
    Http { status: u16, message: String },
    #[error("Request timeout")]
    Timeout,
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Answer to a group or stream creation call. An existing resource is not a
/// failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
}

/// Opaque cursor the service hands out after each accepted submission.
///
/// The first submission to a fresh stream carries no token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ContinuationToken(Option<String>);

impl ContinuationToken {
    pub fn none() -> Self {
        Self(None)
    }

    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }
}

impl From<Option<String>> for ContinuationToken {
    fn from(token: Option<String>) -> Self {
        Self(token)
    }
}

impl From<&str> for ContinuationToken {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

impl fmt::Display for ContinuationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(token) => f.write_str(token),
            None => f.write_str("<none>"),
        }
    }
}

/// Network boundary of the delivery worker.
///
/// Implementations only perform the calls; retry policy and token bookkeeping
/// belong to the worker.
pub trait DeliveryClient: Send + Sync + 'static {
    fn create_group(
        &self,
        group: &str,
    ) -> impl Future<Output = Result<CreateOutcome, DeliveryError>> + Send;

    fn create_stream(
        &self,
        group: &str,
        stream: &str,
    ) -> impl Future<Output = Result<CreateOutcome, DeliveryError>> + Send;

    /// Submits `events` in order. On success returns the token for the next
    /// submission to the same stream.
    fn submit_batch(
        &self,
        destination: &Destination,
        events: &[LogEvent],
        token: &ContinuationToken,
    ) -> impl Future<Output = Result<ContinuationToken, DeliveryError>> + Send;
}

impl<C: DeliveryClient> DeliveryClient for std::sync::Arc<C> {
    fn create_group(
        &self,
        group: &str,
    ) -> impl Future<Output = Result<CreateOutcome, DeliveryError>> + Send {
        (**self).create_group(group)
    }

    fn create_stream(
        &self,
        group: &str,
        stream: &str,
    ) -> impl Future<Output = Result<CreateOutcome, DeliveryError>> + Send {
        (**self).create_stream(group, stream)
    }

    fn submit_batch(
        &self,
        destination: &Destination,
        events: &[LogEvent],
        token: &ContinuationToken,
    ) -> impl Future<Output = Result<ContinuationToken, DeliveryError>> + Send {
        (**self).submit_batch(destination, events, token)
    }
}
