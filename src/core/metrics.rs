// src/core/metrics.rs

//! Defines and registers Prometheus metrics for master monitoring.
//!
//! This module uses `lazy_static` to ensure that metrics are registered only once
//! globally for the entire application lifecycle.

use lazy_static::lazy_static;
use prometheus::{
    Gauge, Histogram, IntCounter, IntCounterVec, TextEncoder, register_gauge, register_histogram,
    register_int_counter, register_int_counter_vec,
};

lazy_static! {
    // --- Lifecycle Gauges ---
    /// 0 = stopped, 1 = initialized, 2 = running.
    pub static ref LIFECYCLE_STATE: Gauge =
        register_gauge!("quillmaster_lifecycle_state", "Lifecycle state of the master (0 stopped, 1 initialized, 2 running).").unwrap();
    /// A boolean gauge indicating if the registration has been published.
    pub static ref REGISTRATION_PUBLISHED: Gauge =
        register_gauge!("quillmaster_registration_published", "Registration published (1 for true, 0 for false).").unwrap();
    /// A boolean gauge indicating if the catalog finished initializing successfully.
    pub static ref CATALOG_INITIALIZED: Gauge =
        register_gauge!("quillmaster_catalog_initialized", "Catalog initialized (1 for true, 0 for false).").unwrap();

    // --- Counters ---
    /// RPC calls received, labeled by the requested service.
    pub static ref RPC_REQUESTS_TOTAL: IntCounterVec =
        register_int_counter_vec!("quillmaster_rpc_requests_total", "Total number of RPC calls received, labeled by service.", &["service"]).unwrap();
    /// Peers that could not be described during discovery.
    pub static ref DISCOVERY_PEER_ERRORS_TOTAL: IntCounter =
        register_int_counter!("quillmaster_discovery_peer_errors_total", "Total number of failed peer registration lookups.").unwrap();

    // --- Histograms ---
    /// Wall time of a full discovery pass.
    pub static ref DISCOVERY_LATENCY_SECONDS: Histogram =
        register_histogram!("quillmaster_discovery_latency_seconds", "Latency of master set discovery in seconds.").unwrap();
}

/// Gathers all registered metrics and encodes them in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode_to_string(&metric_families).unwrap_or_default()
}
