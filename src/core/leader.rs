// src/core/leader.rs

//! Waits until the local catalog reports itself as leader.
//!
//! This is a bootstrap and testing aid. Request paths must react to leadership
//! changes reported by the catalog instead of polling.

use crate::core::MasterError;
use crate::core::catalog::CatalogManager;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

pub const INITIAL_BACKOFF: Duration = Duration::from_millis(1);
pub const MAX_BACKOFF: Duration = Duration::from_millis(256);

/// Doubles `current`, capped at `MAX_BACKOFF`.
pub fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(MAX_BACKOFF)
}

/// Polls `check` with exponential backoff until it succeeds or `timeout` has
/// elapsed. The check is called with no lock held by this function, and
/// nothing is held across the sleeps.
pub async fn poll_until_ready<F>(mut check: F, timeout: Duration) -> Result<(), MasterError>
where
    F: FnMut() -> Result<(), MasterError>,
{
    let start = Instant::now();
    let mut backoff = INITIAL_BACKOFF;
    let last_status = loop {
        let status = match check() {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        debug!("Leadership not yet established ({}); retrying in {:?}", status, backoff);
        tokio::time::sleep(backoff).await;
        backoff = next_backoff(backoff);
        if start.elapsed() >= timeout {
            break status;
        }
    };

    Err(MasterError::TimedOut(format!(
        "Maximum time exceeded waiting for master leadership: {last_status}"
    )))
}

/// Waits until `catalog` passes its scoped leadership check.
pub async fn wait_until_leader(
    catalog: &dyn CatalogManager,
    timeout: Duration,
) -> Result<(), MasterError> {
    poll_until_ready(|| catalog.check_leader_ready(), timeout).await
}
