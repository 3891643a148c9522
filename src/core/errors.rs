// src/core/errors.rs

//! Defines the primary error type for the master node, plus the compact
//! `RemoteError` form that travels over the wire inside RPC replies and
//! discovery entries.

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// The main error enum, representing all recoverable failures within the master.
///
/// Lifecycle sequencing violations are not represented here: they indicate a bug
/// in the embedding process and abort the offending call path with a panic.
#[derive(Error, Debug)]
pub enum MasterError {
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("IO Error: {0}")]
    IoString(String),

    /// An operation was requested before its prerequisite publication step.
    #[error("Service unavailable: {0}")]
    NotReady(String),

    /// A one-time action was requested again, or a component was used in the wrong phase.
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// A bounded wait exceeded its deadline.
    #[error("Timed out: {0}")]
    TimedOut(String),

    /// A service is not registered with the RPC server, or has been deregistered.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// A peer could not be resolved or contacted.
    #[error("Network error: {0}")]
    Unreachable(String),

    /// A remote service does not know the requested method.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Codec Error: {0}")]
    Codec(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Internal Error: {0}")]
    Internal(String),
}

// Manual implementation of Clone because `std::io::Error` is not cloneable.
// We wrap it in an Arc to allow for cheap, shared cloning.
impl Clone for MasterError {
    fn clone(&self) -> Self {
        match self {
            MasterError::Io(e) => MasterError::Io(Arc::clone(e)),
            MasterError::IoString(s) => MasterError::IoString(s.clone()),
            MasterError::NotReady(s) => MasterError::NotReady(s.clone()),
            MasterError::IllegalState(s) => MasterError::IllegalState(s.clone()),
            MasterError::TimedOut(s) => MasterError::TimedOut(s.clone()),
            MasterError::ServiceUnavailable(s) => MasterError::ServiceUnavailable(s.clone()),
            MasterError::Unreachable(s) => MasterError::Unreachable(s.clone()),
            MasterError::NotFound(s) => MasterError::NotFound(s.clone()),
            MasterError::Codec(s) => MasterError::Codec(s.clone()),
            MasterError::InvalidConfig(s) => MasterError::InvalidConfig(s.clone()),
            MasterError::Internal(s) => MasterError::Internal(s.clone()),
        }
    }
}

impl PartialEq for MasterError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (MasterError::Io(e1), MasterError::Io(e2)) => e1.to_string() == e2.to_string(),
            _ => {
                core::mem::discriminant(self) == core::mem::discriminant(other)
                    && self.message() == other.message()
            }
        }
    }
}

impl MasterError {
    /// Returns the message carried by the error, without the kind prefix.
    pub fn message(&self) -> String {
        match self {
            MasterError::Io(e) => e.to_string(),
            MasterError::IoString(s)
            | MasterError::NotReady(s)
            | MasterError::IllegalState(s)
            | MasterError::TimedOut(s)
            | MasterError::ServiceUnavailable(s)
            | MasterError::Unreachable(s)
            | MasterError::NotFound(s)
            | MasterError::Codec(s)
            | MasterError::InvalidConfig(s)
            | MasterError::Internal(s) => s.clone(),
        }
    }

    /// Returns a copy of this error with `prefix` prepended to its message,
    /// keeping the error kind intact.
    pub fn prepend(self, prefix: &str) -> Self {
        let wrap = |s: String| format!("{prefix}: {s}");
        match self {
            MasterError::Io(e) => MasterError::IoString(wrap(e.to_string())),
            MasterError::IoString(s) => MasterError::IoString(wrap(s)),
            MasterError::NotReady(s) => MasterError::NotReady(wrap(s)),
            MasterError::IllegalState(s) => MasterError::IllegalState(wrap(s)),
            MasterError::TimedOut(s) => MasterError::TimedOut(wrap(s)),
            MasterError::ServiceUnavailable(s) => MasterError::ServiceUnavailable(wrap(s)),
            MasterError::Unreachable(s) => MasterError::Unreachable(wrap(s)),
            MasterError::NotFound(s) => MasterError::NotFound(wrap(s)),
            MasterError::Codec(s) => MasterError::Codec(wrap(s)),
            MasterError::InvalidConfig(s) => MasterError::InvalidConfig(wrap(s)),
            MasterError::Internal(s) => MasterError::Internal(wrap(s)),
        }
    }

    /// The wire code used when this error is embedded in an RPC reply.
    pub fn code(&self) -> ErrorCode {
        match self {
            MasterError::Io(_) | MasterError::IoString(_) => ErrorCode::IoError,
            MasterError::NotReady(_) => ErrorCode::NotReady,
            MasterError::IllegalState(_) => ErrorCode::IllegalState,
            MasterError::TimedOut(_) => ErrorCode::TimedOut,
            MasterError::ServiceUnavailable(_) => ErrorCode::ServiceUnavailable,
            MasterError::Unreachable(_) => ErrorCode::Unreachable,
            MasterError::NotFound(_) => ErrorCode::NotFound,
            MasterError::Codec(_) => ErrorCode::Codec,
            MasterError::InvalidConfig(_) => ErrorCode::InvalidArgument,
            MasterError::Internal(_) => ErrorCode::Internal,
        }
    }
}

/// The status code carried by a `RemoteError`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Encode,
    Decode,
    strum_macros::Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotReady,
    IllegalState,
    TimedOut,
    ServiceUnavailable,
    Unreachable,
    NotFound,
    IoError,
    Codec,
    InvalidArgument,
    Internal,
}

/// A serializable error status, scoped to a single RPC reply or discovery entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct RemoteError {
    pub code: ErrorCode,
    pub message: String,
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl From<&MasterError> for RemoteError {
    fn from(e: &MasterError) -> Self {
        RemoteError {
            code: e.code(),
            message: e.message(),
        }
    }
}

impl From<MasterError> for RemoteError {
    fn from(e: MasterError) -> Self {
        RemoteError::from(&e)
    }
}

impl From<RemoteError> for MasterError {
    fn from(e: RemoteError) -> Self {
        let msg = e.message;
        match e.code {
            ErrorCode::NotReady => MasterError::NotReady(msg),
            ErrorCode::IllegalState => MasterError::IllegalState(msg),
            ErrorCode::TimedOut => MasterError::TimedOut(msg),
            ErrorCode::ServiceUnavailable => MasterError::ServiceUnavailable(msg),
            ErrorCode::Unreachable => MasterError::Unreachable(msg),
            ErrorCode::NotFound => MasterError::NotFound(msg),
            ErrorCode::IoError => MasterError::IoString(msg),
            ErrorCode::Codec => MasterError::Codec(msg),
            ErrorCode::InvalidArgument => MasterError::InvalidConfig(msg),
            ErrorCode::Internal => MasterError::Internal(msg),
        }
    }
}

// --- From trait implementations for easy error conversion ---

impl From<std::io::Error> for MasterError {
    fn from(e: std::io::Error) -> Self {
        MasterError::Io(Arc::new(e))
    }
}

impl From<bincode::error::EncodeError> for MasterError {
    fn from(e: bincode::error::EncodeError) -> Self {
        MasterError::Codec(format!("Failed to encode message: {e}"))
    }
}

impl From<bincode::error::DecodeError> for MasterError {
    fn from(e: bincode::error::DecodeError) -> Self {
        MasterError::Codec(format!("Failed to decode message: {e}"))
    }
}

impl From<tokio::task::JoinError> for MasterError {
    fn from(e: tokio::task::JoinError) -> Self {
        MasterError::Internal(format!("Background task failed: {e}"))
    }
}
