pub mod client;
pub mod cloudwatch;
pub mod metrics;
pub mod serialization;

pub use client::{ContinuationToken, CreateOutcome, DeliveryClient, DeliveryError};
pub use cloudwatch::{ClientConfig, CloudWatchClient, ConnectionStats};
#[cfg(feature = "metrics")]
pub use metrics::render_prometheus;
pub use metrics::{DeliveryMetrics, DeliverySnapshot};
pub use serialization::{LogEvent, RecordSerializer, SerializationError};
