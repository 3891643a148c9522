// src/core/maintenance.rs

//! A periodic background task that drives the master's maintenance operations.

use crate::core::MasterError;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Debug)]
pub struct MaintenanceManager {
    polling_interval: Duration,
    ticks: Arc<AtomicU64>,
    shutdown_tx: broadcast::Sender<()>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MaintenanceManager {
    pub fn new(polling_interval: Duration) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            polling_interval,
            ticks: Arc::new(AtomicU64::new(0)),
            shutdown_tx,
            task: Mutex::new(None),
        }
    }

    /// Spawns the scheduler loop. Must be called from within a Tokio runtime.
    pub fn init(&self, server_uuid: &str) -> Result<(), MasterError> {
        let mut task = self.task.lock();
        if task.is_some() {
            return Err(MasterError::IllegalState(
                "Maintenance manager is already running".to_string(),
            ));
        }

        let interval = self.polling_interval;
        let ticks = self.ticks.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let owner = server_uuid.to_string();
        *task = Some(tokio::spawn(async move {
            info!("Maintenance manager started for {} (interval {:?}).", owner, interval);
            let mut timer = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        let n = ticks.fetch_add(1, Ordering::Relaxed) + 1;
                        debug!("Maintenance scheduler tick #{}", n);
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Maintenance manager shutting down.");
                        return;
                    }
                }
            }
        }));
        Ok(())
    }

    /// Number of scheduler passes completed so far.
    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Signals the scheduler loop and waits for it to exit.
    pub async fn shutdown(&self) -> Result<(), MasterError> {
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            let _ = self.shutdown_tx.send(());
            handle.await?;
        }
        Ok(())
    }
}
