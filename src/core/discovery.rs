// src/core/discovery.rs

//! Discovers the set of masters in the cluster.
//!
//! Every configured master address is asked for its registration. Several
//! addresses may lead to the same node (aliases, stale entries), so results are
//! collapsed by the node's permanent uuid.

use crate::config::MasterOptions;
use crate::core::MasterError;
use crate::core::catalog::CatalogManager;
use crate::core::errors::RemoteError;
use crate::core::metrics;
use crate::core::protocol::{HostPort, PeerRole, ServerEntry};
use crate::core::registration::RegistrationBuilder;
use crate::core::transport::MasterProxy;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct MasterSetDiscovery {
    options: MasterOptions,
    registration: Arc<RegistrationBuilder>,
    catalog: Arc<dyn CatalogManager>,
    rpc_timeout: Duration,
}

impl MasterSetDiscovery {
    pub fn new(
        options: MasterOptions,
        registration: Arc<RegistrationBuilder>,
        catalog: Arc<dyn CatalogManager>,
        rpc_timeout: Duration,
    ) -> Self {
        Self {
            options,
            registration,
            catalog,
            rpc_timeout,
        }
    }

    /// The entry describing this node, built without any I/O.
    pub fn local_entry(&self) -> Result<ServerEntry, MasterError> {
        let registration = self.registration.get()?;
        Ok(ServerEntry {
            instance_id: Some(self.catalog.node_instance()),
            registration: Some(registration),
            role: PeerRole::Leader,
            error: None,
        })
    }

    /// Returns one entry per distinct master.
    ///
    /// Identified entries come first, ordered by uuid; entries whose peer could
    /// not report an identity follow in configuration order.
    pub async fn list_masters(&self) -> Result<Vec<ServerEntry>, MasterError> {
        if !self.options.is_distributed() {
            return Ok(vec![self.local_entry()?]);
        }
        if !self.registration.is_ready() {
            return Err(MasterError::NotReady(
                "Master startup not complete".to_string(),
            ));
        }

        let timer = metrics::DISCOVERY_LATENCY_SECONDS.start_timer();
        let lookups = self
            .options
            .master_addresses
            .iter()
            .map(|addr| entry_for_peer(addr, self.rpc_timeout));
        let entries = futures::future::join_all(lookups).await;
        timer.observe_duration();

        debug!(
            "Queried {} master addresses for their registration.",
            entries.len()
        );
        Ok(dedup_by_identity(entries))
    }
}

/// Asks one configured address for its registration. Failures are folded
/// into the returned entry.
async fn entry_for_peer(addr: &HostPort, timeout: Duration) -> ServerEntry {
    let prefix = format!("Unable to get registration information for peer ({addr})");
    let proxy = MasterProxy::new(addr.clone(), timeout);

    let failure = |instance_id, error: MasterError| {
        let error = error.prepend(&prefix);
        warn!("{}", error);
        metrics::DISCOVERY_PEER_ERRORS_TOTAL.inc();
        ServerEntry::failed(instance_id, RemoteError::from(error))
    };

    match proxy.get_master_registration().await {
        // The identity is kept even when the peer reports an error.
        Ok(resp) => match (resp.error, resp.registration) {
            (Some(remote), _) => failure(resp.instance_id, MasterError::from(remote)),
            (None, Some(registration)) => ServerEntry {
                instance_id: resp.instance_id,
                registration: Some(registration),
                role: resp.role,
                error: None,
            },
            (None, None) => failure(
                resp.instance_id,
                MasterError::Internal("peer returned no registration".to_string()),
            ),
        },
        Err(e) => failure(None, e),
    }
}

/// Collapses entries that share a uuid, keeping the first one seen.
pub fn dedup_by_identity(entries: Vec<ServerEntry>) -> Vec<ServerEntry> {
    let mut identified: BTreeMap<String, ServerEntry> = BTreeMap::new();
    let mut unidentified = Vec::new();
    for entry in entries {
        match entry.uuid() {
            Some(uuid) => {
                let uuid = uuid.to_string();
                identified.entry(uuid).or_insert(entry);
            }
            None => unidentified.push(entry),
        }
    }
    identified.into_values().chain(unidentified).collect()
}
