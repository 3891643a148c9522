// src/core/catalog/local.rs

use super::CatalogManager;
use crate::core::MasterError;
use crate::core::protocol::{NodeInstance, PeerRole};
use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::info;

#[derive(Debug)]
struct CatalogState {
    initialized: bool,
    shut_down: bool,
    role: PeerRole,
}

/// An in-memory catalog collaborator.
///
/// In a single-master deployment it becomes leader as soon as it is
/// initialized. In a distributed deployment it starts as a follower and its
/// role is driven from outside through `set_role`.
#[derive(Debug)]
pub struct LocalCatalog {
    instance: NodeInstance,
    distributed: bool,
    state: RwLock<CatalogState>,
}

impl LocalCatalog {
    pub fn new(instance: NodeInstance, distributed: bool) -> Self {
        Self {
            instance,
            distributed,
            state: RwLock::new(CatalogState {
                initialized: false,
                shut_down: false,
                role: PeerRole::Unknown,
            }),
        }
    }

    /// Records a role change reported by the replication layer.
    pub fn set_role(&self, role: PeerRole) {
        let mut state = self.state.write();
        if state.role != role {
            info!("Catalog role changed: {} -> {}", state.role, role);
            state.role = role;
        }
    }
}

#[async_trait]
impl CatalogManager for LocalCatalog {
    async fn init(&self, is_first_run: bool) -> Result<(), MasterError> {
        let mut state = self.state.write();
        if state.shut_down {
            return Err(MasterError::ServiceUnavailable(
                "Catalog manager is shut down".to_string(),
            ));
        }
        if state.initialized {
            return Err(MasterError::IllegalState(
                "Catalog manager is already initialized".to_string(),
            ));
        }
        if is_first_run {
            info!("Creating a new system catalog for {}", self.instance.permanent_uuid);
        } else {
            info!("Loading system catalog for {}", self.instance.permanent_uuid);
        }
        state.initialized = true;
        state.role = if self.distributed {
            PeerRole::Follower
        } else {
            PeerRole::Leader
        };
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.state.read().initialized
    }

    fn node_instance(&self) -> NodeInstance {
        self.instance.clone()
    }

    fn check_leader_ready(&self) -> Result<(), MasterError> {
        let state = self.state.read();
        if state.shut_down {
            return Err(MasterError::ServiceUnavailable(
                "Catalog manager is shut down".to_string(),
            ));
        }
        if !state.initialized {
            return Err(MasterError::NotReady(
                "Catalog manager is not initialized".to_string(),
            ));
        }
        if state.role != PeerRole::Leader {
            return Err(MasterError::IllegalState(format!(
                "Not the leader. Local role: {}",
                state.role
            )));
        }
        Ok(())
    }

    fn role(&self) -> PeerRole {
        self.state.read().role
    }

    async fn shutdown(&self) {
        let mut state = self.state.write();
        state.shut_down = true;
        state.role = PeerRole::Unknown;
    }
}
