// src/core/protocol/mod.rs

//! Wire types shared by the RPC server, the peer proxy and the services.

pub mod frame;
pub mod host_port;
pub mod messages;

pub use host_port::HostPort;
pub use messages::{NodeInstance, PeerRole, ServerEntry};
