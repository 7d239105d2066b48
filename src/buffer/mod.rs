pub mod batch;
pub mod queue;

pub use batch::{Batch, BatchCollector, BatchConfig, CollectOutcome};
pub use queue::{EventQueue, Polled, QUEUE_CAPACITY_FACTOR, QueueError, QueueReceiver, QueueStats};
