// src/core/tasks/catalog_init.rs

//! Runs catalog initialization on a dedicated single worker, away from the
//! tasks that accept and serve RPCs, and records its outcome.

use crate::core::MasterError;
use crate::core::catalog::CatalogManager;
use crate::core::metrics;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

type Task = BoxFuture<'static, ()>;

/// A single-assignment slot for the catalog initialization result.
///
/// Any number of readers may wait on it; all of them observe the same value.
#[derive(Debug, Clone)]
pub struct InitOutcome {
    tx: Arc<watch::Sender<Option<Result<(), MasterError>>>>,
}

impl Default for InitOutcome {
    fn default() -> Self {
        Self::new()
    }
}

impl InitOutcome {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Stores the result. Fails with `IllegalState` if a result was already stored.
    pub fn set(&self, result: Result<(), MasterError>) -> Result<(), MasterError> {
        let mut result = Some(result);
        let stored = self.tx.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = result.take();
            true
        });
        if stored {
            Ok(())
        } else {
            Err(MasterError::IllegalState(
                "Catalog initialization outcome is already set".to_string(),
            ))
        }
    }

    /// Returns the stored result without waiting.
    pub fn peek(&self) -> Option<Result<(), MasterError>> {
        self.tx.borrow().clone()
    }

    /// Waits until a result is stored, or until `deadline` elapses.
    pub async fn wait(&self, deadline: Option<Duration>) -> Result<(), MasterError> {
        let mut rx = self.tx.subscribe();
        let wait = async move {
            match rx.wait_for(|slot| slot.is_some()).await {
                Ok(slot) => slot.clone().unwrap_or_else(|| {
                    Err(MasterError::Internal(
                        "catalog initialization outcome vanished".to_string(),
                    ))
                }),
                Err(_) => Err(MasterError::Internal(
                    "catalog initialization outcome channel closed".to_string(),
                )),
            }
        };

        match deadline {
            Some(limit) => tokio::time::timeout(limit, wait).await.map_err(|_| {
                MasterError::TimedOut(format!(
                    "catalog manager initialization did not finish within {limit:?}"
                ))
            })?,
            None => wait.await,
        }
    }
}

/// A task runner backed by exactly one worker.
#[derive(Debug)]
pub struct InitExecutor {
    name: String,
    tx: Mutex<Option<mpsc::UnboundedSender<Task>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    outcome: InitOutcome,
    catalog_init_submitted: AtomicBool,
}

impl InitExecutor {
    /// Spawns the worker. Must be called from within a Tokio runtime.
    pub fn new(name: &str) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Task>();
        let worker_name = name.to_string();
        let worker = tokio::spawn(async move {
            debug!("Executor '{}' worker started.", worker_name);
            while let Some(task) = rx.recv().await {
                task.await;
            }
            debug!("Executor '{}' worker exited.", worker_name);
        });

        Self {
            name: name.to_string(),
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
            outcome: InitOutcome::new(),
            catalog_init_submitted: AtomicBool::new(false),
        }
    }

    /// Enqueues a task behind any task already queued on the worker.
    pub fn submit(&self, task: Task) -> Result<(), MasterError> {
        let tx = self.tx.lock();
        let Some(tx) = tx.as_ref() else {
            return Err(MasterError::IllegalState(format!(
                "executor '{}' is shut down",
                self.name
            )));
        };
        tx.send(task).map_err(|_| {
            MasterError::IllegalState(format!("executor '{}' worker has exited", self.name))
        })
    }

    /// Submits the one catalog initialization task of this process.
    pub fn submit_catalog_init(
        &self,
        catalog: Arc<dyn CatalogManager>,
        is_first_run: bool,
    ) -> Result<(), MasterError> {
        if self.catalog_init_submitted.swap(true, Ordering::AcqRel) {
            return Err(MasterError::IllegalState(
                "Catalog manager initialization was already submitted".to_string(),
            ));
        }

        let outcome = self.outcome.clone();
        let submitted = self.submit(Box::pin(async move {
            let result = init_catalog_manager(catalog.as_ref(), is_first_run).await;
            match &result {
                Ok(()) => {
                    metrics::CATALOG_INITIALIZED.set(1.0);
                    info!("Catalog manager initialized.");
                }
                Err(e) => error!("Unable to init master catalog manager: {}", e),
            }
            if let Err(e) = outcome.set(result) {
                error!("{}", e);
            }
        }));

        if submitted.is_err() {
            self.catalog_init_submitted.store(false, Ordering::Release);
        }
        submitted
    }

    pub fn outcome(&self) -> &InitOutcome {
        &self.outcome
    }

    /// Blocks until the catalog initialization outcome is available.
    pub async fn wait_for_outcome(&self, deadline: Option<Duration>) -> Result<(), MasterError> {
        self.outcome.wait(deadline).await
    }

    /// Stops accepting tasks and waits for the worker to drain its queue.
    pub async fn shutdown(&self) -> Result<(), MasterError> {
        drop(self.tx.lock().take());
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            worker.await?;
        }
        Ok(())
    }
}

async fn init_catalog_manager(
    catalog: &dyn CatalogManager,
    is_first_run: bool,
) -> Result<(), MasterError> {
    if catalog.is_initialized() {
        return Err(MasterError::IllegalState(
            "Catalog manager is already initialized".to_string(),
        ));
    }
    catalog
        .init(is_first_run)
        .await
        .map_err(|e| e.prepend("Unable to initialize catalog manager"))
}
