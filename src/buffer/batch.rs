use super::queue::{Polled, QueueReceiver};
use crate::sender::metrics::DeliveryMetrics;
use crate::sender::serialization::{LogEvent, RecordSerializer};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub max_size: usize,
    pub poll_interval: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_size: 1024,
            poll_interval: Duration::from_millis(3000),
        }
    }
}

/// Ordered, size-capped run of encoded events awaiting submission.
///
/// Owned by the delivery worker only. `clear` keeps the allocation and starts
/// a new batch id; a batch kept for a retry keeps its id.
#[derive(Debug, Clone)]
pub struct Batch {
    id: String,
    events: Vec<LogEvent>,
    max_size: usize,
}

impl Batch {
    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            events: Vec::with_capacity(max_size),
            max_size,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.events.len() >= self.max_size
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn events(&self) -> &[LogEvent] {
        &self.events
    }

    /// Appends unless full; returns whether the event was taken.
    pub fn push(&mut self, event: LogEvent) -> bool {
        if self.is_full() {
            return false;
        }
        self.events.push(event);
        true
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.id = Uuid::new_v4().to_string();
    }
}

/// Why a collection round ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectOutcome {
    /// `max_size` reached before the deadline.
    Full,
    /// The deadline measured from the last submission attempt passed.
    Deadline,
    /// Stop was requested while waiting.
    Interrupted,
    /// The queue has no producers left.
    Closed,
}

/// Fills a batch from the queue until it is full or the rolling deadline
/// passes.
///
/// The deadline is `last_submit + poll_interval`. It is not pushed back when a
/// record arrives; only a new submission attempt moves it.
pub struct BatchCollector {
    config: BatchConfig,
    serializer: RecordSerializer,
    metrics: Arc<DeliveryMetrics>,
}

impl BatchCollector {
    pub fn new(config: BatchConfig, metrics: Arc<DeliveryMetrics>) -> Self {
        Self {
            config,
            serializer: RecordSerializer::new(),
            metrics,
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub async fn collect(
        &self,
        batch: &mut Batch,
        receiver: &mut QueueReceiver,
        last_submit: Instant,
        shutdown: &CancellationToken,
    ) -> CollectOutcome {
        let deadline = last_submit + self.config.poll_interval;

        // a batch kept full after a token conflict still waits for its slot
        if batch.is_full() {
            return tokio::select! {
                biased;
                _ = shutdown.cancelled() => CollectOutcome::Interrupted,
                _ = tokio::time::sleep_until(deadline) => CollectOutcome::Deadline,
            };
        }

        loop {
            if shutdown.is_cancelled() {
                return CollectOutcome::Interrupted;
            }
            if batch.is_full() {
                return CollectOutcome::Full;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return CollectOutcome::Deadline;
            }

            let polled = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return CollectOutcome::Interrupted,
                polled = receiver.poll(remaining) => polled,
            };

            match polled {
                Polled::Record(record) => {
                    match self.serializer.encode(&record, Utc::now()) {
                        Ok(event) => {
                            batch.push(event);
                        }
                        Err(e) => {
                            self.metrics.record_serialization_failure();
                            warn!("Skipping record that failed to serialize: {e}");
                        }
                    }
                }
                Polled::TimedOut => return CollectOutcome::Deadline,
                Polled::Closed => return CollectOutcome::Closed,
            }
        }
    }

    /// Moves whatever is already queued into the batch without waiting.
    /// Used for the final flush on stop.
    pub fn drain_ready(&self, batch: &mut Batch, receiver: &mut QueueReceiver) -> usize {
        let mut drained = 0;
        while !batch.is_full() {
            let Some(record) = receiver.try_poll() else {
                break;
            };
            match self.serializer.encode(&record, Utc::now()) {
                Ok(event) => {
                    batch.push(event);
                    drained += 1;
                }
                Err(e) => {
                    self.metrics.record_serialization_failure();
                    warn!("Skipping record that failed to serialize: {e}");
                }
            }
        }
        drained
    }
}
