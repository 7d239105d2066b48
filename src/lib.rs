#![deny(rust_2024_compatibility)]
// Specific pedantic lints enforced (not blanket allow):
#![deny(
    clippy::explicit_iter_loop,
    clippy::manual_let_else,
    clippy::semicolon_if_nothing_returned,
    clippy::inconsistent_struct_constructor
)]
// Noisy pedantic lints suppressed with justification:
#![allow(
    clippy::cast_possible_truncation, // Durations in milliseconds fit in u64
    clippy::cast_possible_wrap,       // Queue depths fit in i64
    clippy::missing_errors_doc,       // Internal API
    clippy::module_name_repetitions,  // e.g. ShipperConfig in the service module
    clippy::must_use_candidate,       // Annotated selectively on critical APIs
    clippy::doc_markdown              // Internal API
)]

//! Batches structured log records in memory and ships them to a
//! CloudWatch-Logs-style service from a single background worker.
//!
//! ```ignore
//! let client = CloudWatchClient::new(ClientConfig::default())?;
//! let shipper = Arc::new(LogShipper::new(ShipperConfig::default(), client)?);
//! shipper.start()?;
//! shipper.append(LogRecord::builder("hello").build());
//! shipper.stop().await?;
//! ```

pub mod app;
pub mod buffer;
pub mod domain;
pub mod mapper;
pub mod sender;

pub use app::{App, Config, LogShipper, ShipperConfig, ShipperStats};
pub use domain::{Destination, Level, LogRecord, ShipperError};
pub use mapper::{LineMapper, RecordMapper, ShipperLayer};
pub use sender::{ClientConfig, CloudWatchClient, DeliveryClient};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
