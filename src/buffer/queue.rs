use crate::domain::LogRecord;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::{self, Receiver, Sender, error::TrySendError};
use tokio::time::timeout;

/// The queue holds this many batches worth of records.
pub const QUEUE_CAPACITY_FACTOR: usize = 2;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("Invalid queue capacity: {0}")]
    InvalidCapacity(usize),
}

/// Result of a single [`QueueReceiver::poll`].
#[derive(Debug)]
pub enum Polled {
    Record(LogRecord),
    TimedOut,
    /// Every producer handle is gone; nothing will ever arrive.
    Closed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub capacity: usize,
    pub depth: usize,
    pub accepted: u64,
    pub dropped: u64,
    pub polled: u64,
}

#[derive(Debug, Default)]
struct QueueCounters {
    accepted: AtomicU64,
    dropped: AtomicU64,
    polled: AtomicU64,
}

/// Producer side of the bounded record queue.
///
/// `offer` never blocks. When the queue is full the record is dropped and
/// `false` is returned: producers shed load instead of waiting on the network.
/// Dropped records are only counted, never reported as errors.
#[derive(Clone)]
pub struct EventQueue {
    sender: Sender<LogRecord>,
    counters: Arc<QueueCounters>,
}

/// Consumer side. Exactly one delivery worker polls it at a time.
pub struct QueueReceiver {
    receiver: Receiver<LogRecord>,
    counters: Arc<QueueCounters>,
}

impl EventQueue {
    pub fn bounded(capacity: usize) -> Result<(EventQueue, QueueReceiver), QueueError> {
        // Prevent excessive memory allocation
        if capacity == 0 || capacity > 100_000_000 {
            return Err(QueueError::InvalidCapacity(capacity));
        }

        let (sender, receiver) = mpsc::channel(capacity);
        let counters = Arc::new(QueueCounters::default());

        Ok((
            EventQueue {
                sender,
                counters: counters.clone(),
            },
            QueueReceiver { receiver, counters },
        ))
    }

    /// Queue sized for `max_batch_size` using [`QUEUE_CAPACITY_FACTOR`].
    pub fn for_batch_size(
        max_batch_size: usize,
    ) -> Result<(EventQueue, QueueReceiver), QueueError> {
        Self::bounded(max_batch_size.saturating_mul(QUEUE_CAPACITY_FACTOR))
    }

    #[inline]
    pub fn offer(&self, record: LogRecord) -> bool {
        match self.sender.try_send(record) {
            Ok(()) => {
                self.counters.accepted.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    pub fn capacity(&self) -> usize {
        self.sender.max_capacity()
    }

    pub fn len(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.sender.capacity() == 0
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            capacity: self.capacity(),
            depth: self.len(),
            accepted: self.counters.accepted.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            polled: self.counters.polled.load(Ordering::Relaxed),
        }
    }
}

impl QueueReceiver {
    /// Waits at most `wait` for the next record.
    pub async fn poll(&mut self, wait: Duration) -> Polled {
        if wait.is_zero() {
            return match self.receiver.try_recv() {
                Ok(record) => self.polled(record),
                Err(mpsc::error::TryRecvError::Empty) => Polled::TimedOut,
                Err(mpsc::error::TryRecvError::Disconnected) => Polled::Closed,
            };
        }

        match timeout(wait, self.receiver.recv()).await {
            Ok(Some(record)) => self.polled(record),
            Ok(None) => Polled::Closed,
            Err(_) => Polled::TimedOut,
        }
    }

    /// Takes a record only if one is already queued.
    pub fn try_poll(&mut self) -> Option<LogRecord> {
        match self.receiver.try_recv() {
            Ok(record) => {
                self.counters.polled.fetch_add(1, Ordering::Relaxed);
                Some(record)
            }
            Err(_) => None,
        }
    }

    fn polled(&self, record: LogRecord) -> Polled {
        self.counters.polled.fetch_add(1, Ordering::Relaxed);
        Polled::Record(record)
    }
}

impl std::fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventQueue")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .field("accepted", &self.counters.accepted.load(Ordering::Relaxed))
            .field("dropped", &self.counters.dropped.load(Ordering::Relaxed))
            .finish()
    }
}
