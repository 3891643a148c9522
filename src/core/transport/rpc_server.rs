// src/core/transport/rpc_server.rs

//! A small multi-service RPC server.
//!
//! The server moves through fixed phases: services are registered, the
//! listeners are bound, and only then does it start accepting connections.
//! Splitting `bind` from `serve` lets the master compute its registration
//! from the bound addresses before any peer can reach it.

use crate::core::MasterError;
use crate::core::errors::RemoteError;
use crate::core::metrics;
use crate::core::protocol::HostPort;
use crate::core::protocol::frame::{self, rpc_codec};
use crate::core::protocol::messages::{RpcReply, RpcRequest, RpcResponse};
use crate::core::security::TokenVerifier;
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

/// A named group of RPC methods.
#[async_trait]
pub trait RpcService: Send + Sync + 'static {
    fn service_name(&self) -> &'static str;

    /// Handles one call. `payload` is the bincode-encoded request for `method`;
    /// the returned bytes are the bincode-encoded response.
    async fn handle(&self, method: &str, payload: &[u8]) -> Result<Vec<u8>, MasterError>;
}

type ServiceRegistry = DashMap<String, Arc<dyn RpcService>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
enum ServerPhase {
    Initialized,
    Bound,
    Serving,
    ShutDown,
}

pub struct RpcServer {
    bind_addresses: Vec<HostPort>,
    services: Arc<ServiceRegistry>,
    phase: Mutex<ServerPhase>,
    listeners: Mutex<Vec<TcpListener>>,
    bound: RwLock<Vec<SocketAddr>>,
    shutdown_tx: broadcast::Sender<()>,
    tasks: Mutex<JoinSet<()>>,
    token_verifier: Arc<TokenVerifier>,
}

impl RpcServer {
    pub fn new(bind_addresses: Vec<HostPort>) -> Result<Self, MasterError> {
        if bind_addresses.is_empty() {
            return Err(MasterError::InvalidConfig(
                "RPC server needs at least one bind address".to_string(),
            ));
        }
        let (shutdown_tx, _) = broadcast::channel(1);
        Ok(Self {
            bind_addresses,
            services: Arc::new(DashMap::new()),
            phase: Mutex::new(ServerPhase::Initialized),
            listeners: Mutex::new(Vec::new()),
            bound: RwLock::new(Vec::new()),
            shutdown_tx,
            tasks: Mutex::new(JoinSet::new()),
            token_verifier: Arc::new(TokenVerifier::new()),
        })
    }

    /// The verifier shared with the master's token signer.
    pub fn token_verifier(&self) -> Arc<TokenVerifier> {
        self.token_verifier.clone()
    }

    /// Adds a service. Rejected once the server is serving or shut down.
    pub fn register_service(&self, service: Arc<dyn RpcService>) -> Result<(), MasterError> {
        let phase = *self.phase.lock();
        if matches!(phase, ServerPhase::Serving | ServerPhase::ShutDown) {
            return Err(MasterError::IllegalState(format!(
                "cannot register service '{}': RPC server is {}",
                service.service_name(),
                phase
            )));
        }
        let name = service.service_name().to_string();
        if self.services.contains_key(&name) {
            return Err(MasterError::IllegalState(format!(
                "service '{name}' is already registered"
            )));
        }
        self.services.insert(name.clone(), service);
        debug!("Registered RPC service '{}'.", name);
        Ok(())
    }

    pub fn registered_services(&self) -> Vec<String> {
        let mut names: Vec<String> = self.services.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Removes every service. Calls that arrive afterwards are answered with
    /// `ServiceUnavailable`.
    pub fn unregister_all_services(&self) {
        self.services.clear();
        info!("Unregistered all RPC services.");
    }

    /// Binds every configured address without accepting connections yet.
    pub async fn bind(&self) -> Result<(), MasterError> {
        {
            let phase = *self.phase.lock();
            if phase != ServerPhase::Initialized {
                return Err(MasterError::IllegalState(format!(
                    "cannot bind RPC server: it is {phase}"
                )));
            }
        }

        let mut listeners = Vec::with_capacity(self.bind_addresses.len());
        let mut bound = Vec::with_capacity(self.bind_addresses.len());
        for addr in &self.bind_addresses {
            let listener = TcpListener::bind((addr.host.as_str(), addr.port))
                .await
                .map_err(|e| MasterError::from(e).prepend(&format!("Failed to bind RPC address {addr}")))?;
            let local = listener.local_addr()?;
            info!("RPC server bound to {}", local);
            bound.push(local);
            listeners.push(listener);
        }

        *self.listeners.lock() = listeners;
        *self.bound.write() = bound;
        *self.phase.lock() = ServerPhase::Bound;
        Ok(())
    }

    /// The addresses actually bound, with ephemeral ports resolved.
    pub fn bound_addresses(&self) -> Result<Vec<SocketAddr>, MasterError> {
        let bound = self.bound.read();
        if bound.is_empty() {
            return Err(MasterError::NotReady("RPC server is not bound".to_string()));
        }
        Ok(bound.clone())
    }

    /// Starts accepting connections on the bound listeners.
    pub fn serve(&self) -> Result<(), MasterError> {
        let mut phase = self.phase.lock();
        if *phase != ServerPhase::Bound {
            return Err(MasterError::IllegalState(format!(
                "cannot start serving: RPC server is {}",
                *phase
            )));
        }
        let listeners = std::mem::take(&mut *self.listeners.lock());
        let mut tasks = self.tasks.lock();
        for listener in listeners {
            tasks.spawn(accept_loop(
                listener,
                self.services.clone(),
                self.shutdown_tx.clone(),
                self.shutdown_tx.subscribe(),
            ));
        }
        *phase = ServerPhase::Serving;
        Ok(())
    }

    /// Stops the accept loops and every open connection.
    pub async fn shutdown(&self) -> Result<(), MasterError> {
        {
            let mut phase = self.phase.lock();
            if *phase == ServerPhase::ShutDown {
                return Ok(());
            }
            *phase = ServerPhase::ShutDown;
        }
        let _ = self.shutdown_tx.send(());
        self.listeners.lock().clear();

        let mut tasks = std::mem::take(&mut *self.tasks.lock());
        let mut first_error = None;
        while let Some(res) = tasks.join_next().await {
            if let Err(e) = res {
                first_error.get_or_insert(MasterError::from(e));
            }
        }
        info!("RPC server shut down.");
        first_error.map_or(Ok(()), Err)
    }
}

async fn accept_loop(
    listener: TcpListener,
    services: Arc<ServiceRegistry>,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            res = listener.accept() => match res {
                Ok((socket, peer)) => {
                    debug!("Accepted RPC connection from {}", peer);
                    connections.spawn(handle_connection(
                        socket,
                        peer,
                        services.clone(),
                        shutdown_tx.subscribe(),
                    ));
                }
                Err(e) => warn!("Failed to accept RPC connection: {}", e),
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }
    drop(listener);
    connections.shutdown().await;
}

async fn handle_connection(
    socket: TcpStream,
    peer: SocketAddr,
    services: Arc<ServiceRegistry>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut framed = Framed::new(socket, rpc_codec());
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => return,
            next = framed.next() => {
                let request = match next {
                    Some(Ok(request)) => request,
                    Some(Err(e)) => {
                        warn!("Dropping RPC connection from {}: {}", peer, e);
                        return;
                    }
                    None => return,
                };
                let response = dispatch(&services, &request).await;
                let encoded = match frame::encode(&response) {
                    Ok(encoded) => encoded,
                    Err(e) => {
                        warn!("Failed to encode RPC response for {}: {}", peer, e);
                        return;
                    }
                };
                if let Err(e) = framed.send(Bytes::from(encoded)).await {
                    debug!("Failed to write RPC response to {}: {}", peer, e);
                    return;
                }
            }
        }
    }
}

async fn dispatch(services: &ServiceRegistry, frame: &[u8]) -> RpcResponse {
    let request: RpcRequest = match frame::decode(frame) {
        Ok(request) => request,
        Err(e) => {
            return RpcResponse {
                call_id: 0,
                reply: RpcReply::Err(RemoteError::from(e)),
            };
        }
    };

    metrics::RPC_REQUESTS_TOTAL
        .with_label_values(&[request.service.as_str()])
        .inc();

    // Clone the handle out of the map so no shard lock is held across the call.
    let service = services.get(&request.service).map(|s| s.value().clone());
    let reply = match service {
        Some(service) => match service.handle(&request.method, &request.payload).await {
            Ok(payload) => RpcReply::Ok(payload),
            Err(e) => RpcReply::Err(RemoteError::from(e)),
        },
        None => RpcReply::Err(RemoteError::from(MasterError::ServiceUnavailable(format!(
            "service '{}' is not registered",
            request.service
        )))),
    };

    RpcResponse {
        call_id: request.call_id,
        reply,
    }
}
