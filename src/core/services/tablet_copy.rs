// src/core/services/tablet_copy.rs

use crate::core::MasterError;
use crate::core::catalog::CatalogManager;
use crate::core::protocol::frame;
use crate::core::protocol::messages::{
    BEGIN_TABLET_COPY_SESSION, BeginTabletCopySessionRequest, BeginTabletCopySessionResponse,
    TABLET_COPY_SERVICE,
};
use crate::core::transport::RpcService;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Lets another master open a session to copy the catalog from this node.
/// Only the handshake lives here; the data transfer belongs to the catalog.
pub struct TabletCopyService {
    catalog: Arc<dyn CatalogManager>,
}

impl TabletCopyService {
    pub fn new(catalog: Arc<dyn CatalogManager>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl RpcService for TabletCopyService {
    fn service_name(&self) -> &'static str {
        TABLET_COPY_SERVICE
    }

    async fn handle(&self, method: &str, payload: &[u8]) -> Result<Vec<u8>, MasterError> {
        match method {
            BEGIN_TABLET_COPY_SESSION => {
                let request: BeginTabletCopySessionRequest = frame::decode(payload)?;
                if !self.catalog.is_initialized() {
                    return Err(MasterError::NotReady(
                        "Catalog manager is not yet initialized".to_string(),
                    ));
                }
                let session_id = uuid::Uuid::new_v4().simple().to_string();
                info!(
                    "Opened tablet copy session {} for {}",
                    session_id, request.requestor_uuid
                );
                frame::encode(&BeginTabletCopySessionResponse {
                    session_id,
                    source: self.catalog.node_instance(),
                })
            }
            other => Err(MasterError::NotFound(format!(
                "unknown method '{other}' on service '{TABLET_COPY_SERVICE}'"
            ))),
        }
    }
}
