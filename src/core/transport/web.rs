// src/core/transport/web.rs

//! The master's embedded HTTP server, optionally served over TLS.

use crate::config::WebserverConfig;
use crate::core::MasterError;
use crate::core::protocol::HostPort;
use axum::Router;
use axum::serve::Listener;
use parking_lot::{Mutex, RwLock};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::{JoinHandle, JoinSet};
use tokio_rustls::TlsAcceptor;
use tokio_rustls::server::TlsStream;
use tracing::{debug, error, info, warn};

/// How long a client may take to complete the TLS handshake.
const TLS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct WebServer {
    bind_address: HostPort,
    acceptor: Option<TlsAcceptor>,
    listener: Mutex<Option<TcpListener>>,
    bound: RwLock<Vec<SocketAddr>>,
    shutdown_tx: broadcast::Sender<()>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl WebServer {
    /// Prepares the server and loads the TLS material if it is configured.
    pub fn new(config: &WebserverConfig) -> Result<Self, MasterError> {
        let acceptor = match (&config.tls_cert_path, &config.tls_key_path) {
            (Some(cert_path), Some(key_path)) => {
                info!("HTTPS is enabled. Loading certificate and key.");
                Some(setup_tls(cert_path, key_path)?)
            }
            _ => None,
        };
        let (shutdown_tx, _) = broadcast::channel(1);
        Ok(Self {
            bind_address: config.bind_address.clone(),
            acceptor,
            listener: Mutex::new(None),
            bound: RwLock::new(Vec::new()),
            shutdown_tx,
            task: Mutex::new(None),
        })
    }

    pub fn is_secure(&self) -> bool {
        self.acceptor.is_some()
    }

    pub async fn bind(&self) -> Result<(), MasterError> {
        if !self.bound.read().is_empty() {
            return Err(MasterError::IllegalState(
                "HTTP server is already bound".to_string(),
            ));
        }
        let addr = &self.bind_address;
        let listener = TcpListener::bind((addr.host.as_str(), addr.port))
            .await
            .map_err(|e| MasterError::from(e).prepend(&format!("Failed to bind HTTP address {addr}")))?;
        let local = listener.local_addr()?;
        info!(
            "HTTP server bound to {}://{}",
            if self.is_secure() { "https" } else { "http" },
            local
        );
        *self.listener.lock() = Some(listener);
        *self.bound.write() = vec![local];
        Ok(())
    }

    pub fn bound_addresses(&self) -> Result<Vec<SocketAddr>, MasterError> {
        let bound = self.bound.read();
        if bound.is_empty() {
            return Err(MasterError::NotReady("HTTP server is not bound".to_string()));
        }
        Ok(bound.clone())
    }

    /// Starts serving `router` on the bound listener.
    pub fn serve(&self, router: Router) -> Result<(), MasterError> {
        let listener = self.listener.lock().take().ok_or_else(|| {
            MasterError::IllegalState("HTTP server is not bound or already serving".to_string())
        })?;
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let signal = async move {
            shutdown_rx.recv().await.ok();
            info!("HTTP server shutting down.");
        };

        let handle = match self.acceptor.clone() {
            Some(acceptor) => {
                let listener = TlsListener {
                    inner: listener,
                    acceptor,
                    handshakes: JoinSet::new(),
                };
                tokio::spawn(async move {
                    if let Err(e) = axum::serve(listener, router)
                        .with_graceful_shutdown(signal)
                        .await
                    {
                        error!("HTTPS server exited with error: {}", e);
                    }
                })
            }
            None => tokio::spawn(async move {
                if let Err(e) = axum::serve(listener, router)
                    .with_graceful_shutdown(signal)
                    .await
                {
                    error!("HTTP server exited with error: {}", e);
                }
            }),
        };
        *self.task.lock() = Some(handle);
        Ok(())
    }

    pub async fn shutdown(&self) -> Result<(), MasterError> {
        self.listener.lock().take();
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            let _ = self.shutdown_tx.send(());
            handle.await?;
        }
        Ok(())
    }
}

type Handshake = Option<(TlsStream<TcpStream>, SocketAddr)>;

/// Hands connections to axum once their TLS handshake has completed.
///
/// Handshakes run on their own tasks, so a client that stalls mid-handshake
/// never holds up the clients behind it.
struct TlsListener {
    inner: TcpListener,
    acceptor: TlsAcceptor,
    handshakes: JoinSet<Handshake>,
}

enum TlsEvent {
    Connected(std::io::Result<(TcpStream, SocketAddr)>),
    Handshaken(Result<Handshake, tokio::task::JoinError>),
}

impl Listener for TlsListener {
    type Io = TlsStream<TcpStream>;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        loop {
            let event = tokio::select! {
                res = self.inner.accept() => TlsEvent::Connected(res),
                Some(done) = self.handshakes.join_next(), if !self.handshakes.is_empty() => {
                    TlsEvent::Handshaken(done)
                }
            };

            match event {
                TlsEvent::Connected(Ok((stream, addr))) => {
                    let acceptor = self.acceptor.clone();
                    self.handshakes.spawn(async move {
                        match tokio::time::timeout(TLS_HANDSHAKE_TIMEOUT, acceptor.accept(stream))
                            .await
                        {
                            Ok(Ok(tls)) => Some((tls, addr)),
                            Ok(Err(e)) => {
                                debug!("TLS handshake with {} failed: {}", addr, e);
                                None
                            }
                            Err(_) => {
                                debug!("TLS handshake with {} timed out", addr);
                                None
                            }
                        }
                    });
                }
                TlsEvent::Connected(Err(e)) => {
                    warn!("Failed to accept HTTPS connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
                TlsEvent::Handshaken(Ok(Some(accepted))) => return accepted,
                TlsEvent::Handshaken(Ok(None)) => {}
                TlsEvent::Handshaken(Err(e)) => warn!("TLS handshake task failed: {}", e),
            }
        }
    }

    fn local_addr(&self) -> std::io::Result<Self::Addr> {
        self.inner.local_addr()
    }
}

fn setup_tls(cert_path: &str, key_path: &str) -> Result<TlsAcceptor, MasterError> {
    let certs = load_certs(cert_path)?;
    let key = load_key(key_path)?;
    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let server_config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| MasterError::InvalidConfig(format!("Unsupported TLS configuration: {e}")))?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| MasterError::InvalidConfig(format!("Invalid TLS certificate or key: {e}")))?;
    Ok(TlsAcceptor::from(Arc::new(server_config)))
}

/// Loads TLS certificates from a PEM file.
fn load_certs(path: &str) -> Result<Vec<CertificateDer<'static>>, MasterError> {
    let cert_file = File::open(path).map_err(|e| {
        MasterError::InvalidConfig(format!("Failed to open certificate file '{path}': {e}"))
    })?;
    let mut cert_reader = BufReader::new(cert_file);
    let certs = rustls_pemfile::certs(&mut cert_reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| MasterError::InvalidConfig(format!("Failed to parse '{path}': {e}")))?;
    if certs.is_empty() {
        return Err(MasterError::InvalidConfig(format!(
            "No certificates found in '{path}'"
        )));
    }
    Ok(certs)
}

/// Loads a private key from a PEM file.
fn load_key(path: &str) -> Result<PrivateKeyDer<'static>, MasterError> {
    let key_file = File::open(path).map_err(|e| {
        MasterError::InvalidConfig(format!("Failed to open private key file '{path}': {e}"))
    })?;
    let mut key_reader = BufReader::new(key_file);
    rustls_pemfile::private_key(&mut key_reader)
        .map_err(|e| MasterError::InvalidConfig(format!("Failed to parse '{path}': {e}")))?
        .ok_or_else(|| {
            MasterError::InvalidConfig(format!("No private key found in key file '{path}'"))
        })
}
