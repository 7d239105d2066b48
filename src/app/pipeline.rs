use crate::{
    buffer::{Batch, BatchCollector, CollectOutcome, QueueReceiver},
    domain::Destination,
    sender::{ContinuationToken, CreateOutcome, DeliveryClient, DeliveryError, DeliveryMetrics},
};
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Where the delivery worker currently is in its loop.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    Initializing = 0,
    Collecting = 1,
    Submitting = 2,
    Idle = 3,
    /// No worker task is alive.
    Stopped = 4,
}

impl WorkerPhase {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Initializing,
            1 => Self::Collecting,
            2 => Self::Submitting,
            3 => Self::Idle,
            _ => Self::Stopped,
        }
    }
}

/// How a worker run ended.
#[derive(Debug)]
pub enum WorkerExit {
    /// The stop signal was observed.
    Stopped,
    /// Every producer handle was dropped and the queue is empty.
    QueueClosed,
    /// Group or stream creation failed. The next appended record respawns a
    /// worker.
    Fault(DeliveryError),
}

/// The background loop: collect a batch, submit it, track the continuation
/// token, repeat until stopped.
///
/// Token and batch live here and nowhere else. A respawned worker starts
/// with a fresh token and recovers the right one from the first mismatch.
pub struct DeliveryWorker<C> {
    destination: Destination,
    client: Arc<C>,
    collector: BatchCollector,
    metrics: Arc<DeliveryMetrics>,
    shutdown: CancellationToken,
    create_log_group: bool,
}

impl<C: DeliveryClient> DeliveryWorker<C> {
    pub fn new(
        destination: Destination,
        client: Arc<C>,
        collector: BatchCollector,
        metrics: Arc<DeliveryMetrics>,
        shutdown: CancellationToken,
        create_log_group: bool,
    ) -> Self {
        Self {
            destination,
            client,
            collector,
            metrics,
            shutdown,
            create_log_group,
        }
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    pub async fn run(&self, receiver: &mut QueueReceiver) -> WorkerExit {
        info!(
            "Delivery worker starting for {} (batch_size={}, poll_interval={:?})",
            self.destination,
            self.collector.config().max_size,
            self.collector.config().poll_interval
        );

        self.metrics.set_phase(WorkerPhase::Initializing);
        let initialized = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                self.metrics.set_phase(WorkerPhase::Stopped);
                return WorkerExit::Stopped;
            }
            result = self.initialize() => result,
        };
        if let Err(e) = initialized {
            error!("Delivery worker for {} failed to initialize: {e}", self.destination);
            self.metrics.set_phase(WorkerPhase::Stopped);
            return WorkerExit::Fault(e);
        }

        let mut batch = Batch::with_max_size(self.collector.config().max_size);
        let mut token = ContinuationToken::none();
        let mut last_submit = Instant::now();

        loop {
            let outcome = if self.shutdown.is_cancelled() {
                CollectOutcome::Interrupted
            } else {
                self.metrics.set_phase(WorkerPhase::Collecting);
                self.collector
                    .collect(&mut batch, receiver, last_submit, &self.shutdown)
                    .await
            };

            let exit = match outcome {
                CollectOutcome::Full | CollectOutcome::Deadline => None,
                CollectOutcome::Interrupted => {
                    let drained = self.collector.drain_ready(&mut batch, receiver);
                    debug!("Final flush picked up {drained} queued records");
                    Some(WorkerExit::Stopped)
                }
                CollectOutcome::Closed => Some(WorkerExit::QueueClosed),
            };

            if batch.is_empty() {
                self.metrics.set_phase(WorkerPhase::Idle);
            } else {
                self.metrics.set_phase(WorkerPhase::Submitting);
                self.submit(&mut batch, &mut token).await;
            }
            last_submit = Instant::now();

            if let Some(exit) = exit {
                if !batch.is_empty() {
                    warn!(
                        "Delivery worker stopping with {} unsent records in batch {}",
                        batch.len(),
                        batch.id()
                    );
                }
                info!("Delivery worker for {} stopped ({exit:?})", self.destination);
                self.metrics.set_phase(WorkerPhase::Stopped);
                return exit;
            }
        }
    }

    async fn initialize(&self) -> Result<(), DeliveryError> {
        let group = self.destination.group();

        if self.create_log_group {
            match self.client.create_group(group).await? {
                CreateOutcome::Created => info!("Created log group {group}"),
                CreateOutcome::AlreadyExists => info!("Log group {group} already exists"),
            }
        }

        let stream = self.destination.stream();
        match self.client.create_stream(group, stream).await? {
            CreateOutcome::Created => info!("Created log stream {stream} in {group}"),
            CreateOutcome::AlreadyExists => info!("Log stream {stream} already exists in {group}"),
        }
        Ok(())
    }

    /// One submission attempt. The batch is cleared unless the service asked
    /// for a different token, in which case it is resent on the next round.
    async fn submit(&self, batch: &mut Batch, token: &mut ContinuationToken) {
        let records = batch.len();
        match self
            .client
            .submit_batch(&self.destination, batch.events(), token)
            .await
        {
            Ok(next) => {
                debug!(
                    "Submitted batch {} with {records} records to {}",
                    batch.id(),
                    self.destination
                );
                self.metrics.record_submission(records);
                *token = next;
                batch.clear();
            }
            Err(DeliveryError::SequenceConflict { expected }) => {
                warn!(
                    "Sequence token {token} rejected, resubmitting batch {} with {expected}",
                    batch.id()
                );
                self.metrics.record_sequence_conflict();
                *token = expected;
            }
            Err(DeliveryError::AlreadyAccepted { expected }) => {
                info!("Batch {} was already accepted, continuing with {expected}", batch.id());
                self.metrics.record_sequence_conflict();
                *token = expected;
                batch.clear();
            }
            Err(e) => {
                error!(
                    "Dropping batch {} with {records} records for {}: {e}",
                    batch.id(),
                    self.destination
                );
                self.metrics.record_failure();
                batch.clear();
            }
        }
    }
}
