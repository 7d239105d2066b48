pub mod config;
pub mod initialization;
pub mod logging_system;
pub mod pipeline;
pub mod service;
pub mod shutdown;

pub use config::{Config, ConfigError, LogLevel};
pub use initialization::InitializationError;
pub use logging_system::{LoggingSystem, setup_logging_safe};
pub use pipeline::{DeliveryWorker, WorkerExit, WorkerPhase};
pub use service::{LifecycleState, LogShipper, ShipperConfig, ShipperStats};

use crate::mapper::{LineMapper, RecordMapper};
use crate::sender::{ClientConfig, CloudWatchClient};
use std::io::BufRead;
use std::process;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// The `rask-log-batcher` binary: ships stdin, one record per line.
pub struct App {
    config: Config,
}

impl App {
    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Ok(Self::from_config(Config::from_args_and_env(args)?))
    }

    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let config = self.config;

        let client = CloudWatchClient::new(ClientConfig {
            endpoint: config.endpoint.clone(),
            region: config.region().to_string(),
            timeout: config.request_timeout,
            ..ClientConfig::default()
        })?;
        info!("Delivering to {}", client.endpoint());

        let shipper = Arc::new(LogShipper::new(ShipperConfig::from(&config), client)?);
        shipper.start()?;

        let shutdown = CancellationToken::new();
        shutdown::spawn_signal_listener(shutdown.clone());

        let (eof_tx, eof_rx) = oneshot::channel();
        let reader_shipper = shipper.clone();
        let mapper = LineMapper::new(config.logger_name.as_str()).with_thread_name("stdin-reader");
        let reader_shutdown = shutdown.clone();

        // stdin blocks, so it gets its own OS thread instead of the runtime's
        // blocking pool
        std::thread::Builder::new()
            .name("stdin-reader".to_string())
            .spawn(move || {
                let stdin = std::io::stdin();
                for line in stdin.lock().lines() {
                    if reader_shutdown.is_cancelled() {
                        break;
                    }
                    match line {
                        Ok(line) if line.trim().is_empty() => {}
                        Ok(line) => {
                            reader_shipper.append(mapper.map(line.as_str()));
                        }
                        Err(e) => {
                            warn!("Failed to read stdin: {e}");
                            break;
                        }
                    }
                }
                let _ = eof_tx.send(());
            })?;

        info!("rask-log-batcher is running. Reading records from stdin.");

        tokio::select! {
            _ = shutdown.cancelled() => {}
            _ = eof_rx => info!("End of input reached"),
        }

        shipper.stop().await?;

        let stats = shipper.stats();
        info!(
            "Shipped {} records in {} batches ({} failed batches, {} token conflicts, {} spawns)",
            stats.delivery.records_submitted,
            stats.delivery.batches_submitted,
            stats.delivery.submission_failures,
            stats.delivery.sequence_conflicts,
            stats.delivery.worker_spawns
        );
        Ok(())
    }
}

pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

pub async fn main() -> anyhow::Result<()> {
    let app = match App::from_args(std::env::args_os()) {
        Ok(app) => app,
        Err(ConfigError::DisplayRequested(text)) => {
            println!("{}", text.trim_end());
            process::exit(0);
        }
        Err(e) => {
            eprintln!("Configuration error: {e}");
            process::exit(2);
        }
    };

    let config = app.config();
    if let Err(e) = setup_logging_safe(config.log_level, &config.log_directives) {
        eprintln!("Warning: {e}, continuing without diagnostics");
    }
    info!("Starting rask-log-batcher v{}", get_version());

    if let Err(e) = app.run().await {
        error!("Application error: {e:#}");
        process::exit(1);
    }
    Ok(())
}
