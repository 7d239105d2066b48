use thiserror::Error;

/// Errors surfaced by the shipper's lifecycle API.
///
/// Delivery and serialization failures never show up here: the worker logs them
/// and degrades to data loss or delay.
#[derive(Error, Debug)]
pub enum ShipperError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::app::ConfigError),

    #[error("Shipper already started")]
    AlreadyStarted,

    #[error("Shipper is not started")]
    NotStarted,

    #[error("No tokio runtime available: {0}")]
    NoRuntime(String),
}
