// src/core/transport/mod.rs

//! Network plumbing: the RPC server, the peer proxy and the HTTP server.

pub mod proxy;
pub mod rpc_server;
pub mod web;

pub use proxy::MasterProxy;
pub use rpc_server::{RpcServer, RpcService};
pub use web::WebServer;
