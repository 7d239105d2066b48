use crate::app::pipeline::WorkerPhase;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

/// Point-in-time copy of the delivery counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliverySnapshot {
    pub batches_submitted: u64,
    pub records_submitted: u64,
    pub submission_failures: u64,
    pub sequence_conflicts: u64,
    pub serialization_failures: u64,
    pub worker_spawns: u64,
    pub phase: WorkerPhase,
}

/// Counters shared between the lifecycle controller and its workers.
#[derive(Debug)]
pub struct DeliveryMetrics {
    batches_submitted: AtomicU64,
    records_submitted: AtomicU64,
    submission_failures: AtomicU64,
    sequence_conflicts: AtomicU64,
    serialization_failures: AtomicU64,
    worker_spawns: AtomicU64,
    phase: AtomicU8,
}

impl DeliveryMetrics {
    pub fn new() -> Self {
        Self {
            batches_submitted: AtomicU64::new(0),
            records_submitted: AtomicU64::new(0),
            submission_failures: AtomicU64::new(0),
            sequence_conflicts: AtomicU64::new(0),
            serialization_failures: AtomicU64::new(0),
            worker_spawns: AtomicU64::new(0),
            phase: AtomicU8::new(WorkerPhase::Stopped as u8),
        }
    }

    pub fn record_submission(&self, records: usize) {
        self.batches_submitted.fetch_add(1, Ordering::Relaxed);
        self.records_submitted
            .fetch_add(records as u64, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.submission_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sequence_conflict(&self) {
        self.sequence_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_serialization_failure(&self) {
        self.serialization_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_worker_spawn(&self) {
        self.worker_spawns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_phase(&self, phase: WorkerPhase) {
        self.phase.store(phase as u8, Ordering::Relaxed);
    }

    pub fn phase(&self) -> WorkerPhase {
        WorkerPhase::from_u8(self.phase.load(Ordering::Relaxed))
    }

    pub fn snapshot(&self) -> DeliverySnapshot {
        DeliverySnapshot {
            batches_submitted: self.batches_submitted.load(Ordering::Relaxed),
            records_submitted: self.records_submitted.load(Ordering::Relaxed),
            submission_failures: self.submission_failures.load(Ordering::Relaxed),
            sequence_conflicts: self.sequence_conflicts.load(Ordering::Relaxed),
            serialization_failures: self.serialization_failures.load(Ordering::Relaxed),
            worker_spawns: self.worker_spawns.load(Ordering::Relaxed),
            phase: self.phase(),
        }
    }
}

impl Default for DeliveryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Renders the shipper's counters in the Prometheus text exposition format.
#[cfg(feature = "metrics")]
pub fn render_prometheus(stats: &crate::app::ShipperStats) -> Result<String, prometheus::Error> {
    use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

    let registry = Registry::new();

    let counters: [(&str, &str, u64); 8] = [
        ("rask_records_accepted_total", "Records accepted by the queue", stats.queue.accepted),
        ("rask_records_dropped_total", "Records dropped on a full queue", stats.queue.dropped),
        (
            "rask_batches_submitted_total",
            "Batches accepted by the service",
            stats.delivery.batches_submitted,
        ),
        (
            "rask_records_submitted_total",
            "Records accepted by the service",
            stats.delivery.records_submitted,
        ),
        (
            "rask_submission_failures_total",
            "Batches dropped after a delivery failure",
            stats.delivery.submission_failures,
        ),
        (
            "rask_sequence_conflicts_total",
            "Continuation token mismatches",
            stats.delivery.sequence_conflicts,
        ),
        (
            "rask_serialization_failures_total",
            "Records skipped because they failed to serialize",
            stats.delivery.serialization_failures,
        ),
        ("rask_worker_spawns_total", "Delivery workers spawned", stats.delivery.worker_spawns),
    ];
    for (name, help, value) in counters {
        let counter = IntCounter::new(name, help)?;
        counter.inc_by(value);
        registry.register(Box::new(counter))?;
    }

    let depth = IntGauge::new("rask_queue_depth", "Records waiting in the queue")?;
    depth.set(stats.queue.depth as i64);
    registry.register(Box::new(depth))?;

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
