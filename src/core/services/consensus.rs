// src/core/services/consensus.rs

use crate::core::MasterError;
use crate::core::catalog::CatalogManager;
use crate::core::errors::RemoteError;
use crate::core::protocol::frame;
use crate::core::protocol::messages::{
    CONSENSUS_SERVICE, GET_CONSENSUS_STATE, GetConsensusStateRequest, GetConsensusStateResponse,
};
use crate::core::transport::RpcService;
use async_trait::async_trait;
use std::sync::Arc;

/// Reports the local node's role in the catalog's replication group.
pub struct ConsensusService {
    catalog: Arc<dyn CatalogManager>,
}

impl ConsensusService {
    pub fn new(catalog: Arc<dyn CatalogManager>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl RpcService for ConsensusService {
    fn service_name(&self) -> &'static str {
        CONSENSUS_SERVICE
    }

    async fn handle(&self, method: &str, payload: &[u8]) -> Result<Vec<u8>, MasterError> {
        match method {
            GET_CONSENSUS_STATE => {
                let _: GetConsensusStateRequest = frame::decode(payload)?;
                let response = GetConsensusStateResponse {
                    instance_id: self.catalog.node_instance(),
                    role: self.catalog.role(),
                    leader_status: self.catalog.check_leader_ready().err().map(RemoteError::from),
                };
                frame::encode(&response)
            }
            other => Err(MasterError::NotFound(format!(
                "unknown method '{other}' on service '{CONSENSUS_SERVICE}'"
            ))),
        }
    }
}
