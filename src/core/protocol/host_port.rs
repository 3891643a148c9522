// src/core/protocol/host_port.rs

use crate::core::MasterError;
use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;

/// An unresolved `host:port` pair, as found in configuration and advertised registrations.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Encode, Decode,
)]
pub struct HostPort {
    pub host: String,
    pub port: u16,
}

impl HostPort {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parses `host`, `host:port`, `[v6]` or `[v6]:port`. A bare IPv6 literal
    /// without brackets is treated as a host with the default port.
    pub fn parse(s: &str, default_port: u16) -> Result<Self, MasterError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(MasterError::InvalidConfig(
                "empty address is not a valid host:port".to_string(),
            ));
        }

        let (host, port_str) = if let Some(rest) = s.strip_prefix('[') {
            let (host, after) = rest.split_once(']').ok_or_else(|| {
                MasterError::InvalidConfig(format!("unterminated IPv6 literal in '{s}'"))
            })?;
            match after.strip_prefix(':') {
                Some(port) => (host, Some(port)),
                None if after.is_empty() => (host, None),
                None => {
                    return Err(MasterError::InvalidConfig(format!(
                        "unexpected trailing characters in '{s}'"
                    )));
                }
            }
        } else {
            match s.rsplit_once(':') {
                Some((host, port)) if !host.contains(':') => (host, Some(port)),
                _ => (s, None),
            }
        };

        if host.is_empty() {
            return Err(MasterError::InvalidConfig(format!(
                "missing host in address '{s}'"
            )));
        }

        let port = match port_str {
            Some(p) => p
                .parse::<u16>()
                .map_err(|_| MasterError::InvalidConfig(format!("invalid port in '{s}'")))?,
            None => default_port,
        };

        Ok(Self::new(host, port))
    }

    pub fn from_socket_addr(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }

    /// Resolves the host through the system resolver.
    pub async fn resolve(&self) -> Result<Vec<SocketAddr>, MasterError> {
        let addrs: Vec<SocketAddr> = tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|e| MasterError::Unreachable(format!("unable to resolve {self}: {e}")))?
            .collect();
        if addrs.is_empty() {
            return Err(MasterError::Unreachable(format!(
                "{self} resolved to no addresses"
            )));
        }
        Ok(addrs)
    }
}

impl fmt::Display for HostPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}
