// src/core/transport/proxy.rs

//! Client-side stub for calling another master's RPC services.

use crate::core::MasterError;
use crate::core::protocol::HostPort;
use crate::core::protocol::frame::{self, rpc_codec};
use crate::core::protocol::messages::{
    BEGIN_TABLET_COPY_SESSION, BeginTabletCopySessionRequest, BeginTabletCopySessionResponse,
    CONSENSUS_SERVICE, GET_CONSENSUS_STATE, GET_MASTER_REGISTRATION, GetConsensusStateRequest,
    GetConsensusStateResponse, GetMasterRegistrationRequest, GetMasterRegistrationResponse,
    LIST_MASTERS, ListMastersRequest, ListMastersResponse, MASTER_SERVICE, PING, PingRequest,
    PingResponse, RpcReply, RpcRequest, RpcResponse, TABLET_COPY_SERVICE,
};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

static NEXT_CALL_ID: AtomicU64 = AtomicU64::new(1);

/// Issues one call per connection to a single master, bounded by a timeout
/// that covers resolution, connection, and the round trip.
#[derive(Debug, Clone)]
pub struct MasterProxy {
    addr: HostPort,
    timeout: Duration,
}

impl MasterProxy {
    pub fn new(addr: HostPort, timeout: Duration) -> Self {
        Self { addr, timeout }
    }

    pub fn addr(&self) -> &HostPort {
        &self.addr
    }

    pub async fn call<Req, Resp>(
        &self,
        service: &str,
        method: &str,
        request: &Req,
    ) -> Result<Resp, MasterError>
    where
        Req: bincode::Encode,
        Resp: bincode::Decode<()>,
    {
        let payload = frame::encode(request)?;
        let reply = tokio::time::timeout(self.timeout, self.round_trip(service, method, payload))
            .await
            .map_err(|_| {
                MasterError::TimedOut(format!(
                    "{service}.{method} RPC to {} timed out after {:?}",
                    self.addr, self.timeout
                ))
            })??;
        frame::decode(&reply)
    }

    async fn round_trip(
        &self,
        service: &str,
        method: &str,
        payload: Vec<u8>,
    ) -> Result<Vec<u8>, MasterError> {
        let addrs = self.addr.resolve().await?;
        let stream = connect_any(&self.addr, &addrs).await?;
        let mut framed = Framed::new(stream, rpc_codec());

        let call_id = NEXT_CALL_ID.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest {
            call_id,
            service: service.to_string(),
            method: method.to_string(),
            payload,
        };
        framed
            .send(Bytes::from(frame::encode(&request)?))
            .await
            .map_err(|e| MasterError::Unreachable(format!("failed to send to {}: {e}", self.addr)))?;

        let reply = framed
            .next()
            .await
            .ok_or_else(|| {
                MasterError::Unreachable(format!("connection to {} closed by peer", self.addr))
            })?
            .map_err(|e| MasterError::Unreachable(format!("failed to read from {}: {e}", self.addr)))?;

        let response: RpcResponse = frame::decode(&reply)?;
        if response.call_id != call_id {
            return Err(MasterError::Codec(format!(
                "mismatched call id from {}: expected {call_id}, got {}",
                self.addr, response.call_id
            )));
        }
        match response.reply {
            RpcReply::Ok(bytes) => Ok(bytes),
            RpcReply::Err(remote) => Err(remote.into()),
        }
    }

    pub async fn get_master_registration(
        &self,
    ) -> Result<GetMasterRegistrationResponse, MasterError> {
        self.call(
            MASTER_SERVICE,
            GET_MASTER_REGISTRATION,
            &GetMasterRegistrationRequest {},
        )
        .await
    }

    pub async fn list_masters(&self) -> Result<ListMastersResponse, MasterError> {
        self.call(MASTER_SERVICE, LIST_MASTERS, &ListMastersRequest {})
            .await
    }

    pub async fn ping(&self) -> Result<(), MasterError> {
        let _: PingResponse = self.call(MASTER_SERVICE, PING, &PingRequest {}).await?;
        Ok(())
    }

    pub async fn get_consensus_state(&self) -> Result<GetConsensusStateResponse, MasterError> {
        self.call(
            CONSENSUS_SERVICE,
            GET_CONSENSUS_STATE,
            &GetConsensusStateRequest {},
        )
        .await
    }

    pub async fn begin_tablet_copy_session(
        &self,
        requestor_uuid: &str,
    ) -> Result<BeginTabletCopySessionResponse, MasterError> {
        self.call(
            TABLET_COPY_SERVICE,
            BEGIN_TABLET_COPY_SESSION,
            &BeginTabletCopySessionRequest {
                requestor_uuid: requestor_uuid.to_string(),
            },
        )
        .await
    }
}

async fn connect_any(target: &HostPort, addrs: &[SocketAddr]) -> Result<TcpStream, MasterError> {
    let mut last_error = None;
    for addr in addrs {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) => last_error = Some(e),
        }
    }
    Err(MasterError::Unreachable(match last_error {
        Some(e) => format!("unable to connect to {target}: {e}"),
        None => format!("{target} resolved to no addresses"),
    }))
}
