// src/core/protocol/messages.rs

//! Request and response messages exchanged between masters and their clients.

use crate::core::errors::RemoteError;
use crate::core::registration::RegistrationDescriptor;
use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

// Service names, as registered with the RPC server.
pub const MASTER_SERVICE: &str = "master";
pub const CONSENSUS_SERVICE: &str = "consensus";
pub const TABLET_COPY_SERVICE: &str = "tablet_copy";

// Method names understood by the services above.
pub const GET_MASTER_REGISTRATION: &str = "GetMasterRegistration";
pub const LIST_MASTERS: &str = "ListMasters";
pub const PING: &str = "Ping";
pub const GET_CONSENSUS_STATE: &str = "GetConsensusState";
pub const BEGIN_TABLET_COPY_SESSION: &str = "BeginTabletCopySession";

/// The permanent identity of a node plus the sequence number of the running process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode)]
pub struct NodeInstance {
    /// Cluster-unique identifier, stable across restarts.
    pub permanent_uuid: String,
    /// Distinguishes successive runs of the same node.
    pub instance_seqno: u64,
}

/// The role of a master within the replicated catalog.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Encode,
    Decode,
    strum_macros::Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PeerRole {
    Leader,
    Follower,
    Learner,
    NonParticipant,
    Unknown,
}

/// A generic envelope for a call on a named service.
#[derive(Debug, Clone, Encode, Decode)]
pub struct RpcRequest {
    pub call_id: u64,
    pub service: String,
    pub method: String,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub enum RpcReply {
    Ok(Vec<u8>),
    Err(RemoteError),
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct RpcResponse {
    pub call_id: u64,
    pub reply: RpcReply,
}

/// Carries no fields; the peer answers with its own registration.
#[derive(Debug, Clone, Default, Encode, Decode)]
pub struct GetMasterRegistrationRequest {}

#[derive(Debug, Clone, Encode, Decode)]
pub struct GetMasterRegistrationResponse {
    pub instance_id: Option<NodeInstance>,
    pub registration: Option<RegistrationDescriptor>,
    pub role: PeerRole,
    pub error: Option<RemoteError>,
}

#[derive(Debug, Clone, Default, Encode, Decode)]
pub struct ListMastersRequest {}

#[derive(Debug, Clone, Encode, Decode)]
pub struct ListMastersResponse {
    pub masters: Vec<ServerEntry>,
    pub error: Option<RemoteError>,
}

/// One discovered master. Either `registration` is populated, or `error`
/// explains why the peer could not be described.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct ServerEntry {
    pub instance_id: Option<NodeInstance>,
    pub registration: Option<RegistrationDescriptor>,
    pub role: PeerRole,
    pub error: Option<RemoteError>,
}

impl ServerEntry {
    /// An entry for a peer that could not be described.
    pub fn failed(instance_id: Option<NodeInstance>, error: RemoteError) -> Self {
        Self {
            instance_id,
            registration: None,
            role: PeerRole::Unknown,
            error: Some(error),
        }
    }

    /// The permanent uuid of the entry, if the peer reported one.
    pub fn uuid(&self) -> Option<&str> {
        self.instance_id
            .as_ref()
            .map(|id| id.permanent_uuid.as_str())
            .filter(|uuid| !uuid.is_empty())
    }
}

#[derive(Debug, Clone, Default, Encode, Decode)]
pub struct PingRequest {}

#[derive(Debug, Clone, Default, Encode, Decode)]
pub struct PingResponse {}

#[derive(Debug, Clone, Default, Encode, Decode)]
pub struct GetConsensusStateRequest {}

#[derive(Debug, Clone, Encode, Decode)]
pub struct GetConsensusStateResponse {
    pub instance_id: NodeInstance,
    pub role: PeerRole,
    /// `None` when the local catalog reports itself as leader and ready.
    pub leader_status: Option<RemoteError>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct BeginTabletCopySessionRequest {
    pub requestor_uuid: String,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct BeginTabletCopySessionResponse {
    pub session_id: String,
    pub source: NodeInstance,
}
