// src/core/master/mod.rs

//! The master node and its lifecycle.
//!
//! A `Master` is driven by a single control task through
//! `init -> start_async -> shutdown`. Startup orders its steps so that the
//! registration is published before any RPC can be served, and so that slow
//! catalog initialization never blocks the tasks accepting RPCs.

pub mod path_handlers;

use crate::config::{Config, MasterOptions};
use crate::core::MasterError;
use crate::core::catalog::CatalogManager;
use crate::core::discovery::MasterSetDiscovery;
use crate::core::instance::InstanceMetadata;
use crate::core::leader;
use crate::core::lifecycle::{Lifecycle, LifecycleState};
use crate::core::maintenance::MaintenanceManager;
use crate::core::metrics;
use crate::core::protocol::ServerEntry;
use crate::core::registration::{RegistrationBuilder, RegistrationDescriptor};
use crate::core::security::{CertAuthority, TokenSigner};
use crate::core::services::{ConsensusService, MasterService, TabletCopyService};
use crate::core::tasks::InitExecutor;
use crate::core::transport::{RpcServer, WebServer};
use parking_lot::RwLock;
use path_handlers::WebContext;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Everything built by `init` and torn down by `shutdown`.
struct Components {
    init_executor: InitExecutor,
    cert_authority: Arc<CertAuthority>,
    token_signer: Arc<TokenSigner>,
    rpc_server: RpcServer,
    web_server: Option<WebServer>,
    maintenance: Arc<MaintenanceManager>,
}

pub struct Master {
    config: Config,
    options: MasterOptions,
    instance: InstanceMetadata,
    catalog: Arc<dyn CatalogManager>,
    lifecycle: Lifecycle,
    registration: Arc<RegistrationBuilder>,
    discovery: Arc<MasterSetDiscovery>,
    /// Set by `init`. Cleared again only by a shutdown that follows an
    /// `init` with no start attempt in between.
    components: RwLock<Option<Arc<Components>>>,
}

impl Master {
    pub fn new(
        config: Config,
        instance: InstanceMetadata,
        catalog: Arc<dyn CatalogManager>,
    ) -> Self {
        let options = config.master_options();
        let registration = Arc::new(RegistrationBuilder::new(&config));
        let discovery = Arc::new(MasterSetDiscovery::new(
            options.clone(),
            registration.clone(),
            catalog.clone(),
            config.master_registration_rpc_timeout(),
        ));
        Self {
            config,
            options,
            instance,
            catalog,
            lifecycle: Lifecycle::new(),
            registration,
            discovery,
            components: RwLock::new(None),
        }
    }

    /// Builds the executor, the security collaborators and the transport.
    /// Must be called from within a Tokio runtime.
    pub fn init(&self) -> Result<(), MasterError> {
        self.lifecycle.require(LifecycleState::Stopped, "Master::init");
        // A start attempt shuts the catalog down on its way out, so the
        // components it leaves behind are never replaced.
        if self.components.read().is_some() {
            return Err(MasterError::IllegalState(
                "Master cannot be re-initialized after it was started".to_string(),
            ));
        }

        let rpc_server = RpcServer::new(self.config.rpc_bind_addresses.clone())?;
        let web_server = if self.config.webserver.enabled {
            Some(WebServer::new(&self.config.webserver)?)
        } else {
            None
        };
        let token_signer = TokenSigner::new(
            self.config.authn_token_validity_seconds,
            self.config.tsk_rotation_seconds,
            rpc_server.token_verifier(),
        );

        let components = Components {
            init_executor: InitExecutor::new("init"),
            cert_authority: Arc::new(CertAuthority::new(self.instance.uuid())),
            token_signer: Arc::new(token_signer),
            rpc_server,
            web_server,
            maintenance: Arc::new(MaintenanceManager::new(Duration::from_millis(
                self.config.maintenance.polling_interval_ms,
            ))),
        };
        *self.components.write() = Some(Arc::new(components));

        self.lifecycle
            .advance(LifecycleState::Stopped, LifecycleState::Initialized);
        metrics::LIFECYCLE_STATE.set(1.0);
        info!(
            "Master {} initialized ({} mode).",
            self.instance.uuid(),
            if self.options.is_distributed() {
                "distributed"
            } else {
                "single-master"
            }
        );
        Ok(())
    }

    /// Brings the master online and returns without waiting for the catalog.
    ///
    /// On failure every component that was started is stopped again and the
    /// master ends up `Stopped`.
    pub async fn start_async(&self) -> Result<(), MasterError> {
        self.lifecycle
            .require(LifecycleState::Initialized, "Master::start_async");
        let components = self.components()?;

        if let Err(e) = self.start_components(&components).await {
            error!("Master failed to start: {}", e);
            self.stop_components(&components).await;
            self.lifecycle.stop();
            metrics::LIFECYCLE_STATE.set(0.0);
            return Err(e);
        }

        self.lifecycle
            .advance(LifecycleState::Initialized, LifecycleState::Running);
        metrics::LIFECYCLE_STATE.set(2.0);
        info!("{} started.", self);
        Ok(())
    }

    async fn start_components(&self, c: &Components) -> Result<(), MasterError> {
        c.maintenance.init(self.instance.uuid())?;

        c.rpc_server.register_service(Arc::new(MasterService::new(
            self.catalog.clone(),
            self.registration.clone(),
            self.discovery.clone(),
        )))?;
        c.rpc_server
            .register_service(Arc::new(ConsensusService::new(self.catalog.clone())))?;
        c.rpc_server
            .register_service(Arc::new(TabletCopyService::new(self.catalog.clone())))?;

        c.rpc_server.bind().await?;
        if let Some(web) = &c.web_server {
            web.bind().await?;
        }

        self.registration
            .build(&c.rpc_server, c.web_server.as_ref())
            .map_err(|e| e.prepend("Unable to initialize master registration"))?;
        metrics::REGISTRATION_PUBLISHED.set(1.0);

        c.rpc_server.serve()?;
        if let Some(web) = &c.web_server {
            web.serve(path_handlers::router(WebContext {
                registration: self.registration.clone(),
                discovery: self.discovery.clone(),
            }))?;
        }

        c.init_executor
            .submit_catalog_init(self.catalog.clone(), self.instance.is_first_run)
    }

    /// `start_async` followed by `wait_for_catalog_init`.
    pub async fn start(&self, deadline: Option<Duration>) -> Result<(), MasterError> {
        self.start_async().await?;
        self.wait_for_catalog_init(deadline).await
    }

    /// Waits for the outcome of catalog initialization.
    pub async fn wait_for_catalog_init(
        &self,
        deadline: Option<Duration>,
    ) -> Result<(), MasterError> {
        self.lifecycle
            .require(LifecycleState::Running, "Master::wait_for_catalog_init");
        self.components()?
            .init_executor
            .wait_for_outcome(deadline)
            .await
    }

    /// Polls the catalog until this master is the leader or `timeout` elapses.
    pub async fn wait_until_leader(&self, timeout: Duration) -> Result<(), MasterError> {
        let state = self.lifecycle.current();
        if state != LifecycleState::Running {
            return Err(MasterError::NotReady(format!(
                "Master is not running (state: {state})"
            )));
        }
        leader::wait_until_leader(self.catalog.as_ref(), timeout).await
    }

    pub fn get_registration(&self) -> Result<RegistrationDescriptor, MasterError> {
        self.registration.get()
    }

    pub async fn list_masters(&self) -> Result<Vec<ServerEntry>, MasterError> {
        self.discovery.list_masters().await
    }

    /// Stops the master; the state ends up `Stopped` regardless.
    ///
    /// A running master tears down every component. A master that was only
    /// initialized releases its executor and may be initialized again.
    pub async fn shutdown(&self) {
        match self.lifecycle.current() {
            LifecycleState::Running => {
                if let Ok(components) = self.components() {
                    let name = self.to_string();
                    info!("{} shutting down...", name);
                    self.stop_components(&components).await;
                    info!("{} shutdown complete.", name);
                }
            }
            LifecycleState::Initialized => {
                let released = self.components.write().take();
                if let Some(components) = released
                    && let Err(e) = components.init_executor.shutdown().await
                {
                    warn!("Failed to stop the init executor: {}", e);
                }
                info!("Master {} released without being started.", self.instance.uuid());
            }
            LifecycleState::Stopped => {}
        }
        self.lifecycle.stop();
        metrics::LIFECYCLE_STATE.set(0.0);
    }

    async fn stop_components(&self, c: &Components) {
        // Stop accepting RPCs before anything they depend on goes away.
        c.rpc_server.unregister_all_services();

        if let Err(e) = c.maintenance.shutdown().await {
            warn!("Failed to stop the maintenance manager: {}", e);
        }
        self.catalog.shutdown().await;

        if let Err(e) = c.rpc_server.shutdown().await {
            warn!("Failed to stop the RPC server: {}", e);
        }
        if let Some(web) = &c.web_server
            && let Err(e) = web.shutdown().await
        {
            warn!("Failed to stop the HTTP server: {}", e);
        }
        if let Err(e) = c.init_executor.shutdown().await {
            warn!("Failed to stop the init executor: {}", e);
        }
    }

    fn components(&self) -> Result<Arc<Components>, MasterError> {
        self.components
            .read()
            .clone()
            .ok_or_else(|| MasterError::IllegalState("Master is not initialized".to_string()))
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.current()
    }

    pub fn options(&self) -> &MasterOptions {
        &self.options
    }

    pub fn instance(&self) -> &InstanceMetadata {
        &self.instance
    }

    pub fn catalog(&self) -> &Arc<dyn CatalogManager> {
        &self.catalog
    }

    pub fn rpc_addresses(&self) -> Result<Vec<SocketAddr>, MasterError> {
        self.components()?.rpc_server.bound_addresses()
    }

    pub fn http_addresses(&self) -> Result<Vec<SocketAddr>, MasterError> {
        match &self.components()?.web_server {
            Some(web) => web.bound_addresses(),
            None => Err(MasterError::NotReady(
                "HTTP server is disabled".to_string(),
            )),
        }
    }

    pub fn cert_authority(&self) -> Option<Arc<CertAuthority>> {
        self.components.read().as_ref().map(|c| c.cert_authority.clone())
    }

    pub fn token_signer(&self) -> Option<Arc<TokenSigner>> {
        self.components.read().as_ref().map(|c| c.token_signer.clone())
    }

    pub fn maintenance(&self) -> Option<Arc<MaintenanceManager>> {
        self.components.read().as_ref().map(|c| c.maintenance.clone())
    }
}

impl fmt::Display for Master {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.lifecycle.current() != LifecycleState::Running {
            return write!(f, "Master (stopped)");
        }
        match self.rpc_addresses().ok().and_then(|a| a.first().copied()) {
            Some(addr) => write!(f, "Master@{addr}"),
            None => write!(f, "Master (stopped)"),
        }
    }
}

impl Drop for Master {
    fn drop(&mut self) {
        if self.lifecycle.current() == LifecycleState::Running {
            error!("{} dropped while running; shutdown() was never called.", self);
        }
    }
}
