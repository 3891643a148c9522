// src/core/services/master.rs

//! The "master" RPC service: registration lookup, master listing and ping.

use crate::core::MasterError;
use crate::core::catalog::CatalogManager;
use crate::core::discovery::MasterSetDiscovery;
use crate::core::errors::RemoteError;
use crate::core::protocol::frame;
use crate::core::protocol::messages::{
    GET_MASTER_REGISTRATION, GetMasterRegistrationRequest, GetMasterRegistrationResponse,
    LIST_MASTERS, ListMastersRequest, ListMastersResponse, MASTER_SERVICE, PING, PingRequest,
    PingResponse,
};
use crate::core::protocol::PeerRole;
use crate::core::registration::RegistrationBuilder;
use crate::core::transport::RpcService;
use async_trait::async_trait;
use std::sync::Arc;

pub struct MasterService {
    catalog: Arc<dyn CatalogManager>,
    registration: Arc<RegistrationBuilder>,
    discovery: Arc<MasterSetDiscovery>,
}

impl MasterService {
    pub fn new(
        catalog: Arc<dyn CatalogManager>,
        registration: Arc<RegistrationBuilder>,
        discovery: Arc<MasterSetDiscovery>,
    ) -> Self {
        Self {
            catalog,
            registration,
            discovery,
        }
    }

    /// The identity is always filled in so callers can deduplicate even when
    /// the registration is not yet available.
    fn get_master_registration(&self) -> GetMasterRegistrationResponse {
        let instance_id = Some(self.catalog.node_instance());
        match self.registration.get() {
            Ok(registration) => GetMasterRegistrationResponse {
                instance_id,
                registration: Some(registration),
                role: self.catalog.role(),
                error: None,
            },
            Err(e) => GetMasterRegistrationResponse {
                instance_id,
                registration: None,
                role: PeerRole::Unknown,
                error: Some(RemoteError::from(e)),
            },
        }
    }

    async fn list_masters(&self) -> ListMastersResponse {
        match self.discovery.list_masters().await {
            Ok(masters) => ListMastersResponse {
                masters,
                error: None,
            },
            Err(e) => ListMastersResponse {
                masters: vec![],
                error: Some(RemoteError::from(e)),
            },
        }
    }
}

#[async_trait]
impl RpcService for MasterService {
    fn service_name(&self) -> &'static str {
        MASTER_SERVICE
    }

    async fn handle(&self, method: &str, payload: &[u8]) -> Result<Vec<u8>, MasterError> {
        match method {
            GET_MASTER_REGISTRATION => {
                let _: GetMasterRegistrationRequest = frame::decode(payload)?;
                frame::encode(&self.get_master_registration())
            }
            LIST_MASTERS => {
                let _: ListMastersRequest = frame::decode(payload)?;
                frame::encode(&self.list_masters().await)
            }
            PING => {
                let _: PingRequest = frame::decode(payload)?;
                frame::encode(&PingResponse {})
            }
            other => Err(MasterError::NotFound(format!(
                "unknown method '{other}' on service '{MASTER_SERVICE}'"
            ))),
        }
    }
}
