//! Process-wide shutdown flag
//!
//! Written once from the signal listener task, read by the publish loop
//! before each publish and each wait. Never reset.

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Shared shutdown request flag; every clone observes the same request
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    requested: Arc<watch::Sender<bool>>,
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        let (requested, _) = watch::channel(false);
        Self {
            requested: Arc::new(requested),
        }
    }
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. Returns true only for the first request.
    pub fn trigger(&self) -> bool {
        !self.requested.send_replace(true)
    }

    pub fn is_triggered(&self) -> bool {
        *self.requested.borrow()
    }

    /// Resolve once shutdown has been requested
    pub async fn wait(&self) {
        let mut requested = self.requested.subscribe();
        // The sender lives as long as `self`, so the channel cannot close here
        let _ = requested.wait_for(|requested| *requested).await;
    }
}

/// Spawn a task that triggers `signal` on SIGINT or SIGTERM
pub fn spawn_signal_listener(signal: ShutdownSignal) -> JoinHandle<()> {
    tokio::spawn(async move {
        let source = wait_for_termination().await;
        if signal.trigger() {
            info!(source, "Termination signal received, closing connection...");
        }
    })
}

#[cfg(unix)]
async fn wait_for_termination() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut sigint, mut sigterm) = match (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
    ) {
        (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
        _ => {
            warn!("Failed to install unix signal handlers, falling back to ctrl-c");
            return wait_for_ctrl_c().await;
        }
    };

    tokio::select! {
        _ = sigint.recv() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
    }
}

#[cfg(not(unix))]
async fn wait_for_termination() -> &'static str {
    wait_for_ctrl_c().await
}

async fn wait_for_ctrl_c() -> &'static str {
    match tokio::signal::ctrl_c().await {
        Ok(()) => "ctrl-c",
        Err(e) => {
            warn!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<&'static str>().await
        }
    }
}
