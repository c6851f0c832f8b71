//! Request freshness, single-use request ids, and the fixed source tag.

use crate::errors::{ApiError, ReplayError};
use crate::store::Store;
use std::sync::Arc;
use zkbalance_common::clock::Clock;

pub struct ReplayGuard {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    expected_tag: String,
    window_ms: i64,
    max_future_skew_ms: i64,
}

impl ReplayGuard {
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        expected_tag: impl Into<String>,
        window_ms: i64,
        max_future_skew_ms: i64,
    ) -> Self {
        Self {
            store,
            clock,
            expected_tag: expected_tag.into(),
            window_ms,
            max_future_skew_ms,
        }
    }

    /// Checks run strictly in order: source tag, timestamp window, then request id novelty.
    ///
    /// On success the request id has already been recorded.
    pub async fn validate(&self, request_id: &str, timestamp_ms: i64, context_tag: &str) -> Result<(), ApiError> {
        if context_tag != self.expected_tag {
            return Err(ReplayError::BadSource.into());
        }

        let now = self.clock.now_ms();
        let age = now.saturating_sub(timestamp_ms);
        if age > self.window_ms || age.saturating_neg() > self.max_future_skew_ms {
            return Err(ReplayError::Expired.into());
        }

        if !self.store.insert_nonce(request_id, now).await? {
            return Err(ReplayError::Reused.into());
        }

        Ok(())
    }

    /// How long a nonce must be kept before it can no longer pass the timestamp check.
    pub fn retention_ms(&self) -> i64 {
        self.window_ms + self.max_future_skew_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::time::Duration;
    use zkbalance_common::clock::ManualClock;
    use zkbalance_common::constants::{MAX_FUTURE_SKEW_MS, REPLAY_WINDOW_MS};

    const T0: i64 = 1_700_000_000_000;
    const TAG: &str = "EVERYDAY CHECKING-balance";

    fn guard() -> (ReplayGuard, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(T0));
        let guard = ReplayGuard::new(Arc::new(MemoryStore::new()), clock.clone(), TAG, REPLAY_WINDOW_MS, MAX_FUTURE_SKEW_MS);
        (guard, clock)
    }

    fn replay_err(r: Result<(), ApiError>) -> ReplayError {
        match r {
            Err(ApiError::Replay(e)) => e,
            other => panic!("expected replay error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn first_use_passes_and_any_reuse_fails() {
        let (guard, clock) = guard();
        guard.validate("req-1", T0, TAG).await.unwrap();

        assert_eq!(replay_err(guard.validate("req-1", T0, TAG).await), ReplayError::Reused);

        // A fresh timestamp does not launder a used id.
        clock.advance(Duration::from_secs(60));
        assert_eq!(replay_err(guard.validate("req-1", clock.now_ms(), TAG).await), ReplayError::Reused);
    }

    #[tokio::test]
    async fn stale_and_future_timestamps_are_expired() {
        let (guard, _clock) = guard();
        let stale = T0 - REPLAY_WINDOW_MS - 1;
        assert_eq!(replay_err(guard.validate("novel", stale, TAG).await), ReplayError::Expired);

        let future = T0 + MAX_FUTURE_SKEW_MS + 1;
        assert_eq!(replay_err(guard.validate("novel", future, TAG).await), ReplayError::Expired);

        // Edges are inclusive.
        guard.validate("edge-old", T0 - REPLAY_WINDOW_MS, TAG).await.unwrap();
        guard.validate("edge-new", T0 + MAX_FUTURE_SKEW_MS, TAG).await.unwrap();
    }

    #[tokio::test]
    async fn checks_run_in_order() {
        let (guard, _clock) = guard();
        guard.validate("used", T0, TAG).await.unwrap();

        // Wrong tag wins over everything else.
        assert_eq!(replay_err(guard.validate("used", 0, "SAVINGS-balance").await), ReplayError::BadSource);
        // Stale timestamp wins over reuse.
        assert_eq!(replay_err(guard.validate("used", 0, TAG).await), ReplayError::Expired);
    }

    #[tokio::test]
    async fn rejected_requests_do_not_burn_their_id() {
        let (guard, _clock) = guard();
        assert_eq!(replay_err(guard.validate("retry", T0, "wrong").await), ReplayError::BadSource);
        assert_eq!(replay_err(guard.validate("retry", 0, TAG).await), ReplayError::Expired);
        guard.validate("retry", T0, TAG).await.unwrap();
    }
}
