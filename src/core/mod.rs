// src/core/mod.rs

//! The central module containing the master's lifecycle, discovery and transport.

pub mod catalog;
pub mod discovery;
pub mod errors;
pub mod instance;
pub mod leader;
pub mod lifecycle;
pub mod maintenance;
pub mod master;
pub mod metrics;
pub mod protocol;
pub mod registration;
pub mod security;
pub mod services;
pub mod tasks;
pub mod transport;

pub use errors::MasterError;
pub use master::Master;
