// src/config.rs

//! Manages master configuration: loading, resolving addresses, and validation.

use crate::core::protocol::HostPort;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;
use tracing::warn;

/// The port assumed for RPC addresses that omit one.
pub const DEFAULT_RPC_PORT: u16 = 7051;
/// The port assumed for HTTP addresses that omit one.
pub const DEFAULT_HTTP_PORT: u16 = 8051;

/// Configuration for the embedded HTTP endpoint.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct WebserverConfig {
    /// If false, no HTTP endpoint is started and the registration carries no HTTP addresses.
    pub enabled: bool,
    pub bind_address: HostPort,
    /// Addresses to advertise instead of the bound one. Empty means "advertise what was bound".
    pub advertised_addresses: Vec<HostPort>,
    /// PEM certificate chain. HTTPS is enabled when both paths are set.
    pub tls_cert_path: Option<String>,
    /// PEM private key.
    pub tls_key_path: Option<String>,
}

impl Default for WebserverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: HostPort::new("127.0.0.1", DEFAULT_HTTP_PORT),
            advertised_addresses: vec![],
            tls_cert_path: None,
            tls_key_path: None,
        }
    }
}

impl WebserverConfig {
    pub fn tls_enabled(&self) -> bool {
        self.tls_cert_path.is_some() && self.tls_key_path.is_some()
    }
}

/// Configuration for the background maintenance manager.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MaintenanceConfig {
    #[serde(default = "default_polling_interval_ms")]
    pub polling_interval_ms: u64,
}

fn default_polling_interval_ms() -> u64 {
    250
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            polling_interval_ms: default_polling_interval_ms(),
        }
    }
}

/// A raw representation of the `[webserver]` table before address resolution.
#[derive(Deserialize)]
struct RawWebserverConfig {
    #[serde(default = "default_webserver_enabled")]
    enabled: bool,
    #[serde(default = "default_webserver_bind_address")]
    bind_address: String,
    #[serde(default)]
    advertised_addresses: Vec<String>,
    tls_cert_path: Option<String>,
    tls_key_path: Option<String>,
}

impl Default for RawWebserverConfig {
    fn default() -> Self {
        Self {
            enabled: default_webserver_enabled(),
            bind_address: default_webserver_bind_address(),
            advertised_addresses: vec![],
            tls_cert_path: None,
            tls_key_path: None,
        }
    }
}

fn default_webserver_enabled() -> bool {
    true
}
fn default_webserver_bind_address() -> String {
    format!("127.0.0.1:{DEFAULT_HTTP_PORT}")
}

/// A raw representation of the config file before validation and resolution.
#[derive(Deserialize)]
struct RawConfig {
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default = "default_data_dir")]
    data_dir: String,
    #[serde(default = "default_rpc_bind_addresses")]
    rpc_bind_addresses: Vec<String>,
    #[serde(default)]
    rpc_advertised_addresses: Vec<String>,
    #[serde(default)]
    master_addresses: Vec<String>,
    #[serde(default)]
    distributed: Option<bool>,
    #[serde(default = "default_master_registration_rpc_timeout_ms")]
    master_registration_rpc_timeout_ms: u64,
    #[serde(default = "default_tsk_rotation_seconds")]
    tsk_rotation_seconds: u64,
    #[serde(default = "default_authn_token_validity_seconds")]
    authn_token_validity_seconds: u64,
    #[serde(default)]
    webserver: RawWebserverConfig,
    #[serde(default)]
    maintenance: MaintenanceConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_data_dir() -> String {
    "quillmaster_data".to_string()
}
fn default_rpc_bind_addresses() -> Vec<String> {
    vec![format!("127.0.0.1:{DEFAULT_RPC_PORT}")]
}
fn default_master_registration_rpc_timeout_ms() -> u64 {
    1500
}
fn default_tsk_rotation_seconds() -> u64 {
    60 * 60 * 24 // 1 day
}
fn default_authn_token_validity_seconds() -> u64 {
    60 * 60 * 24 * 7 // 7 days
}

/// Represents the final, validated, and resolved master configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub log_level: String,
    /// Directory holding the node's instance identity file.
    pub data_dir: String,
    pub rpc_bind_addresses: Vec<HostPort>,
    pub rpc_advertised_addresses: Vec<HostPort>,
    /// Every master of the cluster, possibly listing the same node more than once.
    pub master_addresses: Vec<HostPort>,
    /// Explicit override; otherwise derived from `master_addresses`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distributed: Option<bool>,
    /// Per-peer timeout for registration lookups during master discovery.
    pub master_registration_rpc_timeout_ms: u64,
    /// Number of seconds between activations of newly generated token signing keys.
    pub tsk_rotation_seconds: u64,
    /// Validity window of an issued authentication token.
    pub authn_token_validity_seconds: u64,
    pub webserver: WebserverConfig,
    pub maintenance: MaintenanceConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            data_dir: default_data_dir(),
            rpc_bind_addresses: vec![HostPort::new("127.0.0.1", DEFAULT_RPC_PORT)],
            rpc_advertised_addresses: vec![],
            master_addresses: vec![],
            distributed: None,
            master_registration_rpc_timeout_ms: default_master_registration_rpc_timeout_ms(),
            tsk_rotation_seconds: default_tsk_rotation_seconds(),
            authn_token_validity_seconds: default_authn_token_validity_seconds(),
            webserver: WebserverConfig::default(),
            maintenance: MaintenanceConfig::default(),
        }
    }
}

/// The immutable view of the cluster layout consumed by the master.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterOptions {
    pub distributed: bool,
    pub master_addresses: Vec<HostPort>,
}

impl MasterOptions {
    pub fn is_distributed(&self) -> bool {
        self.distributed
    }
}

impl Config {
    /// Creates a new `Config` instance by reading and parsing a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        Self::from_toml_str(&contents).with_context(|| format!("Invalid config file '{path}'"))
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let raw_config: RawConfig =
            toml::from_str(contents).context("Failed to parse TOML configuration")?;

        let web = raw_config.webserver;
        let config = Config {
            log_level: raw_config.log_level,
            data_dir: raw_config.data_dir,
            rpc_bind_addresses: parse_addresses(
                "rpc_bind_addresses",
                &raw_config.rpc_bind_addresses,
                DEFAULT_RPC_PORT,
            )?,
            rpc_advertised_addresses: parse_addresses(
                "rpc_advertised_addresses",
                &raw_config.rpc_advertised_addresses,
                DEFAULT_RPC_PORT,
            )?,
            master_addresses: parse_addresses(
                "master_addresses",
                &raw_config.master_addresses,
                DEFAULT_RPC_PORT,
            )?,
            distributed: raw_config.distributed,
            master_registration_rpc_timeout_ms: raw_config.master_registration_rpc_timeout_ms,
            tsk_rotation_seconds: raw_config.tsk_rotation_seconds,
            authn_token_validity_seconds: raw_config.authn_token_validity_seconds,
            webserver: WebserverConfig {
                enabled: web.enabled,
                bind_address: HostPort::parse(&web.bind_address, DEFAULT_HTTP_PORT)
                    .map_err(|e| anyhow!("webserver.bind_address: {e}"))?,
                advertised_addresses: parse_addresses(
                    "webserver.advertised_addresses",
                    &web.advertised_addresses,
                    DEFAULT_HTTP_PORT,
                )?,
                tls_cert_path: web.tls_cert_path,
                tls_key_path: web.tls_key_path,
            },
            maintenance: raw_config.maintenance,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the resolved configuration to ensure logical consistency.
    pub fn validate(&self) -> Result<()> {
        if self.rpc_bind_addresses.is_empty() {
            return Err(anyhow!("rpc_bind_addresses cannot be empty"));
        }
        if self.data_dir.trim().is_empty() {
            return Err(anyhow!("data_dir cannot be empty"));
        }
        if self.master_registration_rpc_timeout_ms == 0 {
            return Err(anyhow!("master_registration_rpc_timeout_ms cannot be 0"));
        }
        if self.tsk_rotation_seconds == 0 {
            return Err(anyhow!("tsk_rotation_seconds cannot be 0"));
        }
        if self.authn_token_validity_seconds == 0 {
            return Err(anyhow!("authn_token_validity_seconds cannot be 0"));
        }
        if self.maintenance.polling_interval_ms == 0 {
            return Err(anyhow!("maintenance.polling_interval_ms cannot be 0"));
        }

        if self.tsk_rotation_seconds > self.authn_token_validity_seconds {
            warn!(
                "tsk_rotation_seconds ({}) exceeds authn_token_validity_seconds ({}); tokens may outlive the keys that signed them.",
                self.tsk_rotation_seconds, self.authn_token_validity_seconds
            );
        }

        if self.distributed == Some(true) && self.master_addresses.is_empty() {
            return Err(anyhow!(
                "master_addresses cannot be empty when distributed is set to true"
            ));
        }

        match (&self.webserver.tls_cert_path, &self.webserver.tls_key_path) {
            (Some(_), None) => {
                return Err(anyhow!(
                    "webserver.tls_key_path must be set when webserver.tls_cert_path is set"
                ));
            }
            (None, Some(_)) => {
                return Err(anyhow!(
                    "webserver.tls_cert_path must be set when webserver.tls_key_path is set"
                ));
            }
            _ => {}
        }
        Ok(())
    }

    /// Derives the cluster layout. A master is distributed when more than one
    /// master address is configured, unless `distributed` says otherwise.
    pub fn master_options(&self) -> MasterOptions {
        MasterOptions {
            distributed: self
                .distributed
                .unwrap_or(self.master_addresses.len() > 1),
            master_addresses: self.master_addresses.clone(),
        }
    }

    pub fn master_registration_rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.master_registration_rpc_timeout_ms)
    }
}

fn parse_addresses(field: &str, raw: &[String], default_port: u16) -> Result<Vec<HostPort>> {
    raw.iter()
        .map(|s| HostPort::parse(s, default_port).map_err(|e| anyhow!("{field}: {e}")))
        .collect()
}
