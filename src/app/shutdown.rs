use tokio::signal;
#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal as unix_signal};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Cancels `token` on SIGINT or SIGTERM (SIGINT only off unix).
///
/// If no handler can be installed the token is left alone and the caller
/// keeps running until its input ends.
pub fn spawn_signal_listener(token: CancellationToken) {
    tokio::spawn(async move {
        if wait_for_signal().await {
            token.cancel();
        }
    });
}

#[cfg(unix)]
async fn wait_for_signal() -> bool {
    let mut sigterm = match unix_signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(err) => {
            error!("Failed to create SIGTERM handler: {err}");
            return wait_for_ctrl_c().await;
        }
    };

    // a failing Ctrl+C listener disables its branch and leaves SIGTERM armed
    tokio::select! {
        Ok(()) = signal::ctrl_c() => {
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
    true
}

#[cfg(not(unix))]
async fn wait_for_signal() -> bool {
    wait_for_ctrl_c().await
}

async fn wait_for_ctrl_c() -> bool {
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown");
            true
        }
        Err(err) => {
            error!("Failed to listen for SIGINT: {err}");
            false
        }
    }
}
