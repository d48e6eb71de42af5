//! OS signal handling.
//!
//! - SIGINT / SIGTERM: graceful shutdown
//! - SIGHUP: regenerate now, without restarting

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::lifecycle::shutdown::Shutdown;
use crate::manager::Trigger;

/// Translate signals into shutdown or regeneration until shutdown happens.
#[cfg(unix)]
pub async fn handle_signals(shutdown: Arc<Shutdown>, triggers: mpsc::UnboundedSender<Trigger>) {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut terminate, mut hangup) = match (signal(SignalKind::terminate()), signal(SignalKind::hangup())) {
        (Ok(terminate), Ok(hangup)) => (terminate, hangup),
        (Err(e), _) | (_, Err(e)) => {
            tracing::error!(error = %e, "Failed to install signal handlers, only Ctrl+C is honoured");
            if tokio::signal::ctrl_c().await.is_ok() {
                shutdown.trigger();
            }
            return;
        }
    };
    let mut stopped = shutdown.subscribe();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("SIGINT received");
                shutdown.trigger();
                return;
            }
            _ = terminate.recv() => {
                tracing::info!("SIGTERM received");
                shutdown.trigger();
                return;
            }
            _ = hangup.recv() => {
                tracing::info!("SIGHUP received, scheduling regeneration");
                let _ = triggers.send(Trigger::Reload);
            }
            _ = stopped.recv() => return,
        }
    }
}

#[cfg(not(unix))]
pub async fn handle_signals(shutdown: Arc<Shutdown>, _triggers: mpsc::UnboundedSender<Trigger>) {
    let mut stopped = shutdown.subscribe();
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if result.is_ok() {
                tracing::info!("Ctrl+C received");
                shutdown.trigger();
            }
        }
        _ = stopped.recv() => {}
    }
}
