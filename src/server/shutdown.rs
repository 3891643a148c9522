// src/server/shutdown.rs

use anyhow::{Context, Result};
use tokio::signal::unix::{Signal, SignalKind, signal};
use tracing::info;

/// SIGINT and SIGTERM streams, registered once for the life of the process.
pub struct ShutdownSignals {
    sigint: Signal,
    sigterm: Signal,
}

impl ShutdownSignals {
    pub fn register() -> Result<Self> {
        Ok(Self {
            sigint: signal(SignalKind::interrupt()).context("Failed to register SIGINT handler")?,
            sigterm: signal(SignalKind::terminate())
                .context("Failed to register SIGTERM handler")?,
        })
    }

    /// Resolves on the next SIGINT or SIGTERM.
    pub async fn recv(&mut self) {
        tokio::select! {
            _ = self.sigint.recv() => info!("SIGINT received, initiating graceful shutdown."),
            _ = self.sigterm.recv() => info!("SIGTERM received, initiating graceful shutdown."),
        }
    }
}
