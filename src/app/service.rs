use super::Config;
use super::config::{
    ConfigError, validate_batch_size, validate_log_group_name, validate_log_stream_name,
    validate_poll_interval,
};
use super::pipeline::{DeliveryWorker, WorkerExit};
use crate::{
    buffer::{BatchCollector, BatchConfig, EventQueue, QueueReceiver, QueueStats},
    domain::{Destination, LogRecord, ShipperError},
    sender::{DeliveryClient, DeliveryMetrics, DeliverySnapshot},
};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Settings one `LogShipper` is built with.
#[derive(Debug, Clone)]
pub struct ShipperConfig {
    pub region: String,
    pub create_log_group: bool,
    pub log_group_name: String,
    /// `None` derives `<UTC timestamp> <hostname>` at every start.
    pub log_stream_name: Option<String>,
    pub max_batch_size: usize,
    pub poll_interval: Duration,
}

impl Default for ShipperConfig {
    fn default() -> Self {
        Self {
            region: super::config::DEFAULT_REGION.to_string(),
            create_log_group: false,
            log_group_name: super::config::DEFAULT_LOG_GROUP.to_string(),
            log_stream_name: None,
            max_batch_size: super::config::DEFAULT_MAX_BATCH_SIZE,
            poll_interval: Duration::from_millis(super::config::DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

impl ShipperConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_batch_size(self.max_batch_size)?;
        validate_poll_interval(self.poll_interval)?;
        validate_log_group_name(&self.log_group_name)?;
        if let Some(stream) = &self.log_stream_name {
            validate_log_stream_name(stream)?;
        }
        Ok(())
    }

    fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            max_size: self.max_batch_size,
            poll_interval: self.poll_interval,
        }
    }
}

impl From<&Config> for ShipperConfig {
    fn from(config: &Config) -> Self {
        Self {
            region: config.region().to_string(),
            create_log_group: config.create_log_group,
            log_group_name: config.log_group_name.clone(),
            log_stream_name: config.log_stream_name.clone(),
            max_batch_size: config.max_batch_size,
            poll_interval: config.poll_interval,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Snapshot returned by [`LogShipper::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShipperStats {
    /// All zero while stopped.
    pub queue: QueueStats,
    /// Cumulative over every session of the shipper.
    pub delivery: DeliverySnapshot,
}

/// Clears the "worker active" flag when the worker task ends, however it
/// ends: normal return, panic or abort.
struct ActiveGuard(Arc<AtomicBool>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Everything that lives from one `start()` to the matching `stop()`.
struct Session<C> {
    destination: Destination,
    queue: EventQueue,
    receiver: Arc<tokio::sync::Mutex<QueueReceiver>>,
    shutdown: CancellationToken,
    runtime: Handle,
    worker_active: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    client: Arc<C>,
    metrics: Arc<DeliveryMetrics>,
    batch_config: BatchConfig,
    create_log_group: bool,
}

impl<C: DeliveryClient> Session<C> {
    /// Spawns a worker unless one is alive. Check, lock, re-check.
    fn ensure_worker(&self) {
        if self.worker_active.load(Ordering::Acquire) {
            return;
        }

        let mut slot = self.worker.lock();
        if self.worker_active.load(Ordering::Acquire) || self.shutdown.is_cancelled() {
            return;
        }

        self.worker_active.store(true, Ordering::Release);
        let guard = ActiveGuard(self.worker_active.clone());

        let worker = DeliveryWorker::new(
            self.destination.clone(),
            self.client.clone(),
            BatchCollector::new(self.batch_config.clone(), self.metrics.clone()),
            self.metrics.clone(),
            self.shutdown.clone(),
            self.create_log_group,
        );
        let receiver = self.receiver.clone();

        self.metrics.record_worker_spawn();
        debug!("Spawning delivery worker for {}", self.destination);

        // any previous handle belongs to a finished worker
        *slot = Some(self.runtime.spawn(async move {
            let _guard = guard;
            let mut receiver = receiver.lock().await;
            if let WorkerExit::Fault(e) = worker.run(&mut receiver).await {
                warn!("Delivery worker gave up ({e}); the next record starts a new one");
            }
        }));
    }

    async fn join_worker(&self, grace: Duration) {
        let handle = self.worker.lock().take();
        let Some(mut handle) = handle else {
            return;
        };

        match tokio::time::timeout(grace, &mut handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) if e.is_panic() => error!("Delivery worker panicked: {e}"),
            Ok(Err(_)) => {}
            Err(_) => {
                warn!("Delivery worker did not stop within {grace:?}, aborting it");
                handle.abort();
                let _ = handle.await;
            }
        }
    }
}

impl<C> Drop for Session<C> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Accepts records from any thread and ships them in batches from a
/// background task.
///
/// `append` never blocks and never fails: a full queue drops the record, a
/// stopped shipper ignores it. At most one delivery worker is alive at any
/// time; it is spawned by the first `append` after `start` and respawned by
/// the next `append` if it dies.
pub struct LogShipper<C: DeliveryClient> {
    config: ShipperConfig,
    client: Arc<C>,
    metrics: Arc<DeliveryMetrics>,
    lifecycle: Mutex<LifecycleState>,
    session: RwLock<Option<Arc<Session<C>>>>,
}

impl<C: DeliveryClient> LogShipper<C> {
    pub fn new(config: ShipperConfig, client: C) -> Result<Self, ShipperError> {
        config.validate()?;
        Ok(Self {
            config,
            client: Arc::new(client),
            metrics: Arc::new(DeliveryMetrics::new()),
            lifecycle: Mutex::new(LifecycleState::Stopped),
            session: RwLock::new(None),
        })
    }

    pub fn config(&self) -> &ShipperConfig {
        &self.config
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Starts on the runtime of the calling context.
    pub fn start(&self) -> Result<(), ShipperError> {
        let runtime =
            Handle::try_current().map_err(|e| ShipperError::NoRuntime(e.to_string()))?;
        self.start_with_runtime(runtime)
    }

    /// Starts with workers spawned on `runtime`, so `append` works from
    /// threads outside any runtime.
    pub fn start_with_runtime(&self, runtime: Handle) -> Result<(), ShipperError> {
        {
            let mut state = self.lifecycle.lock();
            if *state != LifecycleState::Stopped {
                return Err(ShipperError::AlreadyStarted);
            }
            *state = LifecycleState::Starting;
        }

        let (queue, receiver) = match EventQueue::for_batch_size(self.config.max_batch_size) {
            Ok(pair) => pair,
            Err(e) => {
                *self.lifecycle.lock() = LifecycleState::Stopped;
                return Err(ConfigError::InvalidConfig(e.to_string()).into());
            }
        };

        let host = Destination::local_hostname();
        let destination = Destination::resolve(
            &self.config.log_group_name,
            self.config.log_stream_name.as_deref(),
            &self.config.region,
            Utc::now(),
            host.as_deref(),
        );

        info!(
            "Starting log shipper for {} (queue_capacity={})",
            destination,
            queue.capacity()
        );

        let session = Session {
            destination,
            queue,
            receiver: Arc::new(tokio::sync::Mutex::new(receiver)),
            shutdown: CancellationToken::new(),
            runtime,
            worker_active: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
            client: self.client.clone(),
            metrics: self.metrics.clone(),
            batch_config: self.config.batch_config(),
            create_log_group: self.config.create_log_group,
        };

        *self.session.write() = Some(Arc::new(session));
        *self.lifecycle.lock() = LifecycleState::Running;
        Ok(())
    }

    /// Queues `record` and makes sure a worker is alive to ship it.
    ///
    /// Returns whether the record was queued. `false` means the shipper is not
    /// running or the queue was full.
    pub fn append(&self, record: LogRecord) -> bool {
        let Some(session) = self.session.read().clone() else {
            return false;
        };
        if session.shutdown.is_cancelled() {
            return false;
        }

        let accepted = session.queue.offer(record);
        session.ensure_worker();
        accepted
    }

    /// Signals the worker, gives it one poll interval to submit what it holds,
    /// then aborts it. No submission happens after this returns.
    pub async fn stop(&self) -> Result<(), ShipperError> {
        {
            let mut state = self.lifecycle.lock();
            if *state != LifecycleState::Running {
                return Err(ShipperError::NotStarted);
            }
            *state = LifecycleState::Stopping;
        }

        let session = self.session.write().take();
        if let Some(session) = session {
            info!("Stopping log shipper for {}", session.destination);
            session.shutdown.cancel();
            session.join_worker(self.config.poll_interval).await;

            let dropped = session.queue.stats().dropped;
            if dropped > 0 {
                warn!("{dropped} records were dropped on a full queue during this session");
            }
        }

        *self.lifecycle.lock() = LifecycleState::Stopped;
        info!("Log shipper stopped");
        Ok(())
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        *self.lifecycle.lock()
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle_state() == LifecycleState::Running
    }

    /// Destination of the running session.
    pub fn destination(&self) -> Option<Destination> {
        self.session
            .read()
            .as_ref()
            .map(|session| session.destination.clone())
    }

    /// Whether a worker task is currently alive.
    pub fn worker_active(&self) -> bool {
        self.session
            .read()
            .as_ref()
            .is_some_and(|session| session.worker_active.load(Ordering::Acquire))
    }

    pub fn stats(&self) -> ShipperStats {
        let queue = self
            .session
            .read()
            .as_ref()
            .map(|session| session.queue.stats())
            .unwrap_or_default();

        ShipperStats {
            queue,
            delivery: self.metrics.snapshot(),
        }
    }
}
