//! The verification gate: the single authoritative decision on a proof submission.
//!
//! Steps, first failure wins:
//! 1. bearer authentication (signature, expiry, live session)
//! 2. body shape
//! 3. replay guard (source tag, freshness, single-use id)
//! 4. external proof verification, off the async executor
//! 5. interpretation of `publicSignals[0]`, where `"0"` means the predicate holds

use crate::errors::{ApiError, AuthError};
use crate::models::{Submission, VerificationOutcome};
use crate::replay::ReplayGuard;
use crate::session::SessionService;
use std::sync::Arc;
use tracing::{info, warn};
use zkbalance_common::constants::{SIGNAL_PREDICATE_FAILS, SIGNAL_PREDICATE_HOLDS};
use zkbalance_common::verifier::ProofVerifier;

pub struct VerificationGate {
    sessions: Arc<SessionService>,
    replay: Arc<ReplayGuard>,
    verifier: Arc<dyn ProofVerifier>,
}

impl VerificationGate {
    pub fn new(sessions: Arc<SessionService>, replay: Arc<ReplayGuard>, verifier: Arc<dyn ProofVerifier>) -> Self {
        Self { sessions, replay, verifier }
    }

    pub async fn verify(&self, submission: Submission) -> Result<VerificationOutcome, ApiError> {
        let request_id = submission.request_id.clone().unwrap_or_default();
        let res = self.verify_inner(submission).await;
        match &res {
            Ok(outcome) => info!(
                %request_id,
                verified = outcome.verified,
                proof_valid = outcome.proof_valid,
                "submission decided"
            ),
            Err(e) => warn!(%request_id, error = %e, "submission rejected"),
        }
        res
    }

    async fn verify_inner(&self, submission: Submission) -> Result<VerificationOutcome, ApiError> {
        let bearer = submission.bearer.as_deref().ok_or(AuthError::Missing)?;
        self.sessions.authenticate(bearer).await?;

        let proof = submission
            .proof
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ApiError::Validation("missing proof".to_string()))?;
        let signals = submission
            .public_signals
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApiError::Validation("missing publicSignals".to_string()))?;
        let request_id = submission
            .request_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ApiError::Validation("missing request id".to_string()))?;
        let timestamp_ms = submission
            .timestamp_ms
            .ok_or_else(|| ApiError::Validation("missing or invalid timestamp".to_string()))?;
        let context_tag = submission.context_tag.unwrap_or_default();

        self.replay.validate(&request_id, timestamp_ms, &context_tag).await?;

        let verifier = self.verifier.clone();
        let checked_signals = signals.clone();
        let verified = tokio::task::spawn_blocking(move || verifier.verify(&checked_signals, &proof))
            .await
            .map_err(|e| ApiError::Verifier(format!("verifier task failed: {e}")))?
            .map_err(|e| {
                if e.is_input_error() {
                    ApiError::Validation(e.to_string())
                } else {
                    ApiError::Verifier(e.to_string())
                }
            })?;

        if !verified {
            return Ok(VerificationOutcome::invalid_proof());
        }

        interpret_signal(&signals[0]).map(VerificationOutcome::from_predicate)
    }
}

/// Map the circuit's output signal to "predicate holds".
///
/// The encoding is inverted: `"0"` holds, `"1"` does not. Nothing else is accepted.
pub fn interpret_signal(signal: &str) -> Result<bool, ApiError> {
    match signal {
        SIGNAL_PREDICATE_HOLDS => Ok(true),
        SIGNAL_PREDICATE_FAILS => Ok(false),
        other => Err(ApiError::MalformedSignal(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ReplayError;
    use crate::store::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use zkbalance_common::clock::{Clock, ManualClock};
    use zkbalance_common::constants::{DEFAULT_SOURCE_TAG, MAX_FUTURE_SKEW_MS, REPLAY_WINDOW_MS};
    use zkbalance_common::groth16::ZkError;

    const T0: i64 = 1_700_000_000_000;

    /// Verifier with a canned answer that counts its calls.
    struct StubVerifier {
        answer: fn() -> Result<bool, ZkError>,
        calls: AtomicUsize,
    }

    impl ProofVerifier for StubVerifier {
        fn verify(&self, _public_signals: &[String], _proof: &str) -> Result<bool, ZkError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.answer)()
        }
    }

    struct Harness {
        gate: VerificationGate,
        sessions: Arc<SessionService>,
        clock: Arc<ManualClock>,
        verifier: Arc<StubVerifier>,
    }

    fn harness(answer: fn() -> Result<bool, ZkError>) -> Harness {
        let clock = Arc::new(ManualClock::new(T0));
        let store = Arc::new(MemoryStore::new());
        let sessions = Arc::new(SessionService::new(store.clone(), clock.clone(), b"gate-secret", 1800, 1800));
        let replay = Arc::new(ReplayGuard::new(
            store,
            clock.clone(),
            DEFAULT_SOURCE_TAG,
            REPLAY_WINDOW_MS,
            MAX_FUTURE_SKEW_MS,
        ));
        let verifier = Arc::new(StubVerifier { answer, calls: AtomicUsize::new(0) });
        let gate = VerificationGate::new(sessions.clone(), replay, verifier.clone());
        Harness { gate, sessions, clock, verifier }
    }

    impl Harness {
        async fn bearer(&self) -> String {
            let id = self.sessions.init_session().await.unwrap();
            self.sessions.exchange_token(&id).await.unwrap().access_token
        }

        async fn submission(&self, request_id: &str, signal: &str) -> Submission {
            Submission {
                bearer: Some(self.bearer().await),
                request_id: Some(request_id.to_string()),
                timestamp_ms: Some(self.clock.now_ms()),
                context_tag: Some(DEFAULT_SOURCE_TAG.to_string()),
                proof: Some("opaque-proof".to_string()),
                public_signals: Some(vec![signal.to_string(), "42".to_string()]),
            }
        }
    }

    #[tokio::test]
    async fn signal_zero_means_verified() {
        let h = harness(|| Ok(true));
        let outcome = h.gate.verify(h.submission("r0", "0").await).await.unwrap();
        assert_eq!(outcome, VerificationOutcome { verified: true, proof_valid: true, predicate_holds: true });
    }

    #[tokio::test]
    async fn signal_one_is_a_negative_result_not_an_error() {
        let h = harness(|| Ok(true));
        let outcome = h.gate.verify(h.submission("r1", "1").await).await.unwrap();
        assert_eq!(outcome, VerificationOutcome { verified: false, proof_valid: true, predicate_holds: false });
    }

    #[tokio::test]
    async fn any_other_signal_is_malformed() {
        let h = harness(|| Ok(true));
        let err = h.gate.verify(h.submission("r2", "2").await).await.unwrap_err();
        assert!(matches!(err, ApiError::MalformedSignal(s) if s == "2"));
    }

    #[tokio::test]
    async fn failed_proof_reports_unverified() {
        let h = harness(|| Ok(false));
        let outcome = h.gate.verify(h.submission("r3", "0").await).await.unwrap();
        assert_eq!(outcome, VerificationOutcome::invalid_proof());
    }

    #[tokio::test]
    async fn verifier_failures_are_transient_errors() {
        let h = harness(|| Err(ZkError::Ark("pairing exploded".to_string())));
        let err = h.gate.verify(h.submission("r4", "0").await).await.unwrap_err();
        assert!(matches!(err, ApiError::Verifier(_)));

        let h = harness(|| Err(ZkError::InvalidProof("truncated".to_string())));
        let err = h.gate.verify(h.submission("r5", "0").await).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn auth_runs_before_replay_and_verification() {
        let h = harness(|| Ok(true));
        let mut sub = h.submission("r6", "0").await;
        sub.bearer = None;
        let err = h.gate.verify(sub).await.unwrap_err();
        assert!(matches!(err, ApiError::Auth(AuthError::Missing)));

        let mut sub = h.submission("r6", "0").await;
        sub.bearer = Some("garbage".to_string());
        sub.context_tag = Some("wrong".to_string());
        let err = h.gate.verify(sub).await.unwrap_err();
        assert!(matches!(err, ApiError::Auth(AuthError::Invalid)));
        assert_eq!(h.verifier.calls.load(Ordering::SeqCst), 0);

        // The id was never recorded, so it is still usable.
        h.gate.verify(h.submission("r6", "0").await).await.unwrap();
    }

    #[tokio::test]
    async fn replayed_request_never_reaches_the_verifier() {
        let h = harness(|| Ok(true));
        let sub = h.submission("r7", "0").await;
        h.gate.verify(sub.clone()).await.unwrap();
        let err = h.gate.verify(sub).await.unwrap_err();
        assert!(matches!(err, ApiError::Replay(ReplayError::Reused)));
        assert_eq!(h.verifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_body_fields_are_validation_errors() {
        let h = harness(|| Ok(true));
        let mut sub = h.submission("r8", "0").await;
        sub.proof = None;
        assert!(matches!(h.gate.verify(sub).await.unwrap_err(), ApiError::Validation(_)));

        let mut sub = h.submission("r8", "0").await;
        sub.public_signals = Some(vec![]);
        assert!(matches!(h.gate.verify(sub).await.unwrap_err(), ApiError::Validation(_)));

        let mut sub = h.submission("r8", "0").await;
        sub.timestamp_ms = None;
        assert!(matches!(h.gate.verify(sub).await.unwrap_err(), ApiError::Validation(_)));

        // A missing source tag is a wrong source tag.
        let mut sub = h.submission("r8", "0").await;
        sub.context_tag = None;
        assert!(matches!(h.gate.verify(sub).await.unwrap_err(), ApiError::Replay(ReplayError::BadSource)));
    }

    #[tokio::test]
    async fn bearer_aged_thirty_three_minutes_is_rejected() {
        let h = harness(|| Ok(true));
        let sub = h.submission("r9", "0").await;
        h.clock.advance(Duration::from_secs(33 * 60));
        let err = h.gate.verify(Submission { timestamp_ms: Some(h.clock.now_ms()), ..sub }).await.unwrap_err();
        assert!(matches!(err, ApiError::Auth(AuthError::Expired)));
    }
}
