// src/server/mod.rs

use crate::config::Config;
use crate::core::Master;
use anyhow::{Context, Result};
use std::future::Future;
use tracing::{error, info};

mod initialization;
mod shutdown;

/// The main server startup function, orchestrating all setup phases.
pub async fn run(config: Config) -> Result<()> {
    // Signals arriving at any point after this are observed.
    let mut signals = shutdown::ShutdownSignals::register()?;

    // 1. Load identity and build the master's components.
    let master = initialization::setup(config)?;

    // 2. Bring the RPC and HTTP endpoints up. Catalog init continues in the background.
    master
        .start_async()
        .await
        .context("Failed to start master")?;

    // 3. Serve until asked to stop, then tear everything down in order.
    supervise(&master, signals.recv()).await;
    info!("Master stopped.");
    Ok(())
}

/// Reports the catalog outcome, keeps a started master serving until
/// `shutdown` resolves, then shuts it down.
///
/// A failed catalog does not stop the master: it keeps answering registration
/// and discovery requests.
pub async fn supervise(master: &Master, shutdown: impl Future<Output = ()>) {
    tokio::pin!(shutdown);

    let interrupted = tokio::select! {
        res = master.wait_for_catalog_init(None) => {
            match res {
                Ok(()) => info!("{} is ready.", master),
                Err(e) => error!(
                    "Catalog initialization failed: {}. {} keeps serving its registration.",
                    e, master
                ),
            }
            false
        }
        _ = &mut shutdown => true,
    };
    if !interrupted {
        shutdown.await;
    }

    master.shutdown().await;
}
