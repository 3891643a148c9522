// src/server/initialization.rs

//! Builds a master from configuration: identity, catalog and lifecycle init.

use crate::config::Config;
use crate::core::Master;
use crate::core::catalog::LocalCatalog;
use crate::core::instance::InstanceMetadata;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

/// Loads the node identity and returns an initialized (not yet started) master.
pub fn setup(config: Config) -> Result<Master> {
    log_startup_info(&config);

    let instance = InstanceMetadata::load_or_create(&config.data_dir)
        .with_context(|| format!("Failed to load instance identity from '{}'", config.data_dir))?;
    if instance.is_first_run {
        info!("First run of this master; a new catalog will be created.");
    }

    let options = config.master_options();
    let catalog = Arc::new(LocalCatalog::new(
        instance.instance.clone(),
        options.is_distributed(),
    ));

    let master = Master::new(config, instance, catalog);
    master.init().context("Failed to initialize master")?;
    Ok(master)
}

/// Logs key configuration parameters at startup.
fn log_startup_info(config: &Config) {
    let options = config.master_options();
    if options.is_distributed() {
        info!(
            "Master starting in DISTRIBUTED mode with {} configured masters.",
            options.master_addresses.len()
        );
        warn!("Leadership is decided by the external consensus layer; this node starts as a follower.");
    } else {
        info!("Master starting in SINGLE-MASTER mode.");
    }
    if config.webserver.enabled {
        info!(
            "Embedded webserver enabled on {} ({}).",
            config.webserver.bind_address,
            if config.webserver.tls_enabled() { "https" } else { "http" }
        );
    }
}
