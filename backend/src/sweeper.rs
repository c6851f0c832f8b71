//! Periodic expiry sweep for sessions and request nonces.
//!
//! Runs through the same store operations as request handlers, so it never sees a
//! record half-written.

use crate::errors::ApiError;
use crate::store::Store;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use zkbalance_common::clock::Clock;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub sessions: usize,
    pub nonces: usize,
}

/// One pass: drop expired sessions and nonces older than `nonce_retention_ms`.
pub async fn sweep_once(store: &dyn Store, clock: &dyn Clock, nonce_retention_ms: i64) -> Result<SweepReport, ApiError> {
    let now = clock.now_ms();
    let sessions = store.sweep_sessions(now).await?;
    let nonces = store.sweep_nonces(now.saturating_sub(nonce_retention_ms)).await?;
    Ok(SweepReport { sessions, nonces })
}

/// Spawn the sweeper on the current runtime.
pub fn spawn(store: Arc<dyn Store>, clock: Arc<dyn Clock>, every: Duration, nonce_retention_ms: i64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match sweep_once(store.as_ref(), clock.as_ref(), nonce_retention_ms).await {
                Ok(report) => debug!(sessions = report.sessions, nonces = report.nonces, "sweep finished"),
                Err(e) => warn!(error = %e, "sweep failed"),
            }
        }
    })
}
