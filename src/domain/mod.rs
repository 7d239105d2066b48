//! Domain layer for rask-log-batcher.
//!
//! Contains the value types shared across all modules:
//! - `LogRecord`: the immutable record produced by a mapper and shipped as JSON
//! - `Level`: record severity
//! - `Destination`: the (group, stream, region) a started shipper writes to
//! - `ShipperError`: lifecycle error type

pub mod destination;
pub mod error;
pub mod log_level;
pub mod log_record;

pub use destination::{Destination, sanitize_stream_name};
pub use error::ShipperError;
pub use log_level::Level;
pub use log_record::{
    CallerFrame, CauseInfo, LogRecord, LogRecordBuilder, TIMESTAMP_FORMAT, format_timestamp,
};
