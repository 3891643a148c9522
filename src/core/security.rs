// src/core/security.rs

//! Holders for the master's security collaborators.
//!
//! Key material is generated and persisted by the catalog once this node
//! becomes leader; the types here only carry configuration and whatever
//! material has been handed to them.

use crate::core::MasterError;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{info, warn};

/// The CA certificate and private key, in DER form.
#[derive(Debug, Clone)]
pub struct CaMaterial {
    pub cert_der: Vec<u8>,
    pub key_der: Vec<u8>,
}

/// Holds the cluster's certificate authority once it has been loaded.
#[derive(Debug)]
pub struct CertAuthority {
    server_uuid: String,
    ca: RwLock<Option<CaMaterial>>,
}

impl CertAuthority {
    pub fn new(server_uuid: impl Into<String>) -> Self {
        Self {
            server_uuid: server_uuid.into(),
            ca: RwLock::new(None),
        }
    }

    pub fn server_uuid(&self) -> &str {
        &self.server_uuid
    }

    /// Installs CA material supplied by the catalog. It may only be done once.
    pub fn init(&self, material: CaMaterial) -> Result<(), MasterError> {
        let mut ca = self.ca.write();
        if ca.is_some() {
            return Err(MasterError::IllegalState(
                "Certificate authority is already initialized".to_string(),
            ));
        }
        if material.cert_der.is_empty() || material.key_der.is_empty() {
            return Err(MasterError::IllegalState(
                "Certificate authority material is empty".to_string(),
            ));
        }
        *ca = Some(material);
        info!("Certificate authority initialized on {}", self.server_uuid);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.ca.read().is_some()
    }
}

/// The public half of a token signing key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSigningPublicKey {
    pub key_seq_num: i64,
    pub expire_unix_epoch_seconds: i64,
    pub der: Vec<u8>,
}

/// Verifies authentication tokens against the known public keys. Shared
/// between the RPC server and the token signer.
#[derive(Debug, Default)]
pub struct TokenVerifier {
    keys: RwLock<BTreeMap<i64, TokenSigningPublicKey>>,
}

impl TokenVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Imports keys, ignoring any with a sequence number already known.
    pub fn import_keys(&self, keys: impl IntoIterator<Item = TokenSigningPublicKey>) {
        let mut known = self.keys.write();
        for key in keys {
            known.entry(key.key_seq_num).or_insert(key);
        }
    }

    /// The highest key sequence number seen so far, or -1 if none.
    pub fn max_known_key_seq_num(&self) -> i64 {
        self.keys.read().keys().next_back().copied().unwrap_or(-1)
    }
}

/// Coordinates token signing keys. Keys themselves are loaded during catalog
/// initialization; this holds the timing policy and the verifier binding.
#[derive(Debug)]
pub struct TokenSigner {
    authn_token_validity: Duration,
    key_rotation_interval: Duration,
    verifier: std::sync::Arc<TokenVerifier>,
}

impl TokenSigner {
    pub fn new(
        authn_token_validity_seconds: u64,
        tsk_rotation_seconds: u64,
        verifier: std::sync::Arc<TokenVerifier>,
    ) -> Self {
        if tsk_rotation_seconds > authn_token_validity_seconds {
            warn!(
                "Token signing key rotation interval ({}s) is longer than the token validity window ({}s).",
                tsk_rotation_seconds, authn_token_validity_seconds
            );
        }
        Self {
            authn_token_validity: Duration::from_secs(authn_token_validity_seconds),
            key_rotation_interval: Duration::from_secs(tsk_rotation_seconds),
            verifier,
        }
    }

    pub fn authn_token_validity(&self) -> Duration {
        self.authn_token_validity
    }

    pub fn key_rotation_interval(&self) -> Duration {
        self.key_rotation_interval
    }

    /// A key must verify every token it signed during its active window, so it
    /// stays valid for one rotation interval plus the token validity window.
    pub fn key_validity(&self) -> Duration {
        self.key_rotation_interval + self.authn_token_validity
    }

    pub fn verifier(&self) -> &std::sync::Arc<TokenVerifier> {
        &self.verifier
    }
}
