// src/core/services/mod.rs

//! RPC services a master registers with its RPC server.

pub mod consensus;
pub mod master;
pub mod tablet_copy;

pub use consensus::ConsensusService;
pub use master::MasterService;
pub use tablet_copy::TabletCopyService;
