// src/core/tasks/mod.rs

//! Background work that runs off the RPC path.

pub mod catalog_init;

pub use catalog_init::{InitExecutor, InitOutcome};
