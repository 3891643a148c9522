// src/core/registration.rs

//! Builds and publishes the descriptor a master advertises to its peers and clients.
//!
//! The descriptor can only be computed after the RPC (and HTTP) listeners are
//! bound, and it is published exactly once. Until then every reader receives
//! `MasterError::NotReady`, never a partially filled descriptor.

use crate::config::Config;
use crate::core::MasterError;
use crate::core::protocol::HostPort;
use crate::core::transport::{RpcServer, WebServer};
use bincode::{Decode, Encode};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use sysinfo::System;
use tracing::info;

/// The self-describing set of addresses and metadata a master publishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct RegistrationDescriptor {
    pub rpc_addresses: Vec<HostPort>,
    pub http_addresses: Vec<HostPort>,
    pub https_enabled: bool,
    pub software_version: String,
}

/// The version string embedded in every registration.
pub fn version_info() -> String {
    format!(
        "quillmaster {} ({} build)",
        env!("QUILLMASTER_BUILD_VERSION"),
        env!("QUILLMASTER_BUILD_PROFILE")
    )
}

/// Computes the registration once the transport is bound and guards access to it.
#[derive(Debug)]
pub struct RegistrationBuilder {
    rpc_advertised: Vec<HostPort>,
    http_advertised: Vec<HostPort>,
    published: OnceCell<RegistrationDescriptor>,
}

impl RegistrationBuilder {
    pub fn new(config: &Config) -> Self {
        Self {
            rpc_advertised: config.rpc_advertised_addresses.clone(),
            http_advertised: config.webserver.advertised_addresses.clone(),
            published: OnceCell::new(),
        }
    }

    /// Reads the bound addresses from the transport, then publishes the descriptor.
    ///
    /// Must be called exactly once, after binding and before the master is
    /// advertised as running. A second call fails with `IllegalState`.
    pub fn build(
        &self,
        rpc_server: &RpcServer,
        web_server: Option<&WebServer>,
    ) -> Result<RegistrationDescriptor, MasterError> {
        if self.published.get().is_some() {
            return Err(MasterError::IllegalState(
                "Master registration is already initialized".to_string(),
            ));
        }

        let rpc_bound = rpc_server
            .bound_addresses()
            .map_err(|e| e.prepend("Couldn't get RPC addresses"))?;
        let rpc_addresses = advertised_addresses(&self.rpc_advertised, &rpc_bound);

        let (http_addresses, https_enabled) = match web_server {
            Some(web) => {
                let http_bound = web
                    .bound_addresses()
                    .map_err(|e| e.prepend("Couldn't get HTTP addresses"))?;
                (
                    advertised_addresses(&self.http_advertised, &http_bound),
                    web.is_secure(),
                )
            }
            None => (vec![], false),
        };

        let descriptor = RegistrationDescriptor {
            rpc_addresses,
            http_addresses,
            https_enabled,
            software_version: version_info(),
        };

        self.published.set(descriptor.clone()).map_err(|_| {
            MasterError::IllegalState("Master registration is already initialized".to_string())
        })?;
        info!(
            "Master registration published: rpc={:?} http={:?} https={}",
            descriptor.rpc_addresses, descriptor.http_addresses, descriptor.https_enabled
        );
        Ok(descriptor)
    }

    /// Returns a copy of the published descriptor.
    pub fn get(&self) -> Result<RegistrationDescriptor, MasterError> {
        self.published
            .get()
            .cloned()
            .ok_or_else(|| MasterError::NotReady("Master startup not complete".to_string()))
    }

    pub fn is_ready(&self) -> bool {
        self.published.get().is_some()
    }
}

/// Configured overrides win. Otherwise bound addresses are advertised, with
/// wildcard binds replaced by the machine's hostname.
fn advertised_addresses(overrides: &[HostPort], bound: &[SocketAddr]) -> Vec<HostPort> {
    if !overrides.is_empty() {
        return overrides.to_vec();
    }
    bound
        .iter()
        .map(|addr| {
            if addr.ip().is_unspecified() {
                let host = System::host_name().unwrap_or_else(|| addr.ip().to_string());
                HostPort::new(host, addr.port())
            } else {
                HostPort::from_socket_addr(*addr)
            }
        })
        .collect()
}
