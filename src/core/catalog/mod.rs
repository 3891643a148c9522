// src/core/catalog/mod.rs

//! The narrow interface through which the master drives its metadata catalog.
//!
//! The catalog engine itself lives outside this crate; `LocalCatalog` is an
//! in-memory stand-in that satisfies the same contract.

use crate::core::MasterError;
use crate::core::protocol::{NodeInstance, PeerRole};
use async_trait::async_trait;

pub mod local;

pub use local::LocalCatalog;

#[async_trait]
pub trait CatalogManager: Send + Sync + 'static {
    /// Loads (or, on the first run, creates) the catalog. A second call must
    /// fail with `MasterError::IllegalState`.
    async fn init(&self, is_first_run: bool) -> Result<(), MasterError>;

    fn is_initialized(&self) -> bool;

    /// The identity of the node hosting this catalog.
    fn node_instance(&self) -> NodeInstance;

    /// A point-in-time leadership check. Implementations take a short read
    /// guard and release it before returning; `Ok(())` means this node is the
    /// leader and ready to serve.
    fn check_leader_ready(&self) -> Result<(), MasterError>;

    /// The current role of this node in the catalog's replication group.
    fn role(&self) -> PeerRole;

    async fn shutdown(&self);
}
