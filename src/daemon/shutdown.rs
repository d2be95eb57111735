//! Shutdown coordination
//!
//! Signal handlers only cancel a token; the loops observe it at their cycle
//! boundaries and while sleeping.

use log::info;
use tokio::signal::unix::{SignalKind, signal};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once shutdown has been triggered.
    pub async fn wait(&self) {
        self.token.cancelled().await;
    }

    /// Trigger shutdown on the first SIGINT or SIGTERM. Must be called inside a tokio runtime.
    pub fn listen_for_signals(&self) -> Result<JoinHandle<()>> {
        let mut terminate = signal(SignalKind::terminate())?;
        let mut interrupt = signal(SignalKind::interrupt())?;
        let shutdown = self.clone();

        Ok(tokio::spawn(async move {
            tokio::select! {
                _ = terminate.recv() => info!("Received SIGTERM, shutting down"),
                _ = interrupt.recv() => info!("Received SIGINT, shutting down"),
                _ = shutdown.wait() => return,
            }
            shutdown.trigger();
        }))
    }
}
