// tests/integration/test_helpers.rs

//! Test helpers and utilities for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use quillmaster::config::Config;
use quillmaster::core::catalog::CatalogManager;
use quillmaster::core::instance::InstanceMetadata;
use quillmaster::core::protocol::{HostPort, NodeInstance, PeerRole};
use quillmaster::core::{Master, MasterError};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Notify;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Sets up minimal tracing for tests (ignores the error if already initialized).
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::new("warn"))
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

/// A scriptable catalog collaborator.
pub struct MockCatalog {
    instance: NodeInstance,
    initialized: AtomicBool,
    leader: AtomicBool,
    gated: bool,
    release: Notify,
    fail_with: Mutex<Option<MasterError>>,
    role: RwLock<PeerRole>,
    pub init_calls: AtomicUsize,
    pub shutdown_calls: AtomicUsize,
}

impl MockCatalog {
    pub fn new(instance: NodeInstance) -> Self {
        Self {
            instance,
            initialized: AtomicBool::new(false),
            leader: AtomicBool::new(false),
            gated: false,
            release: Notify::new(),
            fail_with: Mutex::new(None),
            role: RwLock::new(PeerRole::Follower),
            init_calls: AtomicUsize::new(0),
            shutdown_calls: AtomicUsize::new(0),
        }
    }

    /// `init` blocks until `release_init` is called.
    pub fn gated(mut self) -> Self {
        self.gated = true;
        self
    }

    /// `init` fails with `error`.
    pub fn failing(self, error: MasterError) -> Self {
        *self.fail_with.lock() = Some(error);
        self
    }

    /// Reports itself as initialized before `init` is ever called.
    pub fn pre_initialized(self) -> Self {
        self.initialized.store(true, Ordering::SeqCst);
        self
    }

    pub fn release_init(&self) {
        self.release.notify_one();
    }

    pub fn become_leader(&self) {
        *self.role.write() = PeerRole::Leader;
        self.leader.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl CatalogManager for MockCatalog {
    async fn init(&self, _is_first_run: bool) -> Result<(), MasterError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        if self.gated {
            self.release.notified().await;
        }
        let failure = self.fail_with.lock().clone();
        if let Some(e) = failure {
            return Err(e);
        }
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn node_instance(&self) -> NodeInstance {
        self.instance.clone()
    }

    fn check_leader_ready(&self) -> Result<(), MasterError> {
        if self.leader.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(MasterError::NotReady("not the leader yet".to_string()))
        }
    }

    fn role(&self) -> PeerRole {
        *self.role.read()
    }

    async fn shutdown(&self) {
        self.shutdown_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// A config that binds only ephemeral loopback ports.
pub fn test_config(data_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.data_dir = data_dir.path().display().to_string();
    config.rpc_bind_addresses = vec![HostPort::new("127.0.0.1", 0)];
    config.webserver.bind_address = HostPort::new("127.0.0.1", 0);
    config.maintenance.polling_interval_ms = 10;
    config.master_registration_rpc_timeout_ms = 1000;
    config
}

/// A master wired to a `MockCatalog`, with its own data directory.
pub struct TestMaster {
    pub master: Master,
    pub catalog: Arc<MockCatalog>,
    _data_dir: TempDir,
}

impl TestMaster {
    /// An initialized single-node master with a default mock catalog.
    pub fn new() -> Self {
        Self::build(|c| c, |_| {})
    }

    /// Customizes the catalog and the config before `Master::init` runs.
    pub fn build(
        catalog: impl FnOnce(MockCatalog) -> MockCatalog,
        configure: impl FnOnce(&mut Config),
    ) -> Self {
        init_tracing();
        let data_dir = TempDir::new().expect("Failed to create temp dir");
        let mut config = test_config(&data_dir);
        configure(&mut config);

        let instance = InstanceMetadata::load_or_create(data_dir.path())
            .expect("Failed to create instance identity");
        let catalog = Arc::new(catalog(MockCatalog::new(instance.instance.clone())));
        let master = Master::new(config, instance, catalog.clone());
        master.init().expect("Failed to initialize master");

        Self {
            master,
            catalog,
            _data_dir: data_dir,
        }
    }

    /// Starts the master and waits for the catalog.
    pub async fn started() -> Self {
        let test = Self::new();
        test.master
            .start(Some(Duration::from_secs(5)))
            .await
            .expect("Failed to start master");
        test
    }

    pub fn rpc_addr(&self) -> SocketAddr {
        self.master.rpc_addresses().expect("RPC server not bound")[0]
    }

    pub fn rpc_host_port(&self) -> HostPort {
        HostPort::from_socket_addr(self.rpc_addr())
    }

    pub fn http_addr(&self) -> SocketAddr {
        self.master.http_addresses().expect("HTTP server not bound")[0]
    }
}

/// An address on which nothing is listening.
pub fn dead_address() -> HostPort {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local_addr");
    drop(listener);
    HostPort::from_socket_addr(addr)
}

/// An HTTP client for the master's web endpoint. Certificates are not
/// verified, so the self-signed test fixture is accepted.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .danger_accept_invalid_certs(true)
        .build()
        .expect("Failed to build HTTP client")
}

/// GETs `path` from a plain HTTP endpoint.
pub async fn http_get(addr: SocketAddr, path: &str) -> reqwest::Response {
    http_client()
        .get(format!("http://{addr}{path}"))
        .send()
        .await
        .expect("HTTP request failed")
}

/// GETs `path` from an HTTPS endpoint.
pub async fn https_get(addr: SocketAddr, path: &str) -> reqwest::Response {
    http_client()
        .get(format!("https://{addr}{path}"))
        .send()
        .await
        .expect("HTTPS request failed")
}

/// Points the webserver at the self-signed certificate under `tests/fixtures`.
pub fn use_test_tls(config: &mut Config) {
    let fixtures = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");
    config.webserver.tls_cert_path = Some(format!("{fixtures}/localhost.crt"));
    config.webserver.tls_key_path = Some(format!("{fixtures}/localhost.key"));
}
