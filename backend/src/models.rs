use serde::{Deserialize, Serialize};
use zkbalance_common::protocol::VerifyResponse;

/// Anonymous server-side session.
///
/// Timestamps are epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    /// 256-bit random id, hex encoded. This is what the client holds as its session token.
    pub id: String,
    /// Server-only secret, never returned to the client.
    pub secret: String,
    pub created_at: i64,
    pub expires_at: i64,
}

impl SessionRecord {
    pub fn is_live(&self, now_ms: i64) -> bool {
        now_ms < self.expires_at
    }
}

/// Claims embedded in a bearer credential.
///
/// `iat`/`exp` are epoch seconds, as JWT expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BearerClaims {
    /// Session id the credential was minted from.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Result of [`crate::session::SessionService::exchange_token`].
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub access_token: String,
    pub expires_in: u64,
}

/// Everything a `/verify` call carries, after header extraction.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    pub bearer: Option<String>,
    pub request_id: Option<String>,
    /// Epoch milliseconds from `X-Timestamp`; `None` if absent or not an integer.
    pub timestamp_ms: Option<i64>,
    pub context_tag: Option<String>,
    pub proof: Option<String>,
    pub public_signals: Option<Vec<String>>,
}

/// Successful gate decision. A negative outcome is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationOutcome {
    /// True iff the proof checked out and the predicate holds.
    pub verified: bool,
    /// Whether the cryptographic check succeeded.
    pub proof_valid: bool,
    pub predicate_holds: bool,
}

impl VerificationOutcome {
    pub fn invalid_proof() -> Self {
        Self { verified: false, proof_valid: false, predicate_holds: false }
    }

    pub fn from_predicate(predicate_holds: bool) -> Self {
        Self { verified: predicate_holds, proof_valid: true, predicate_holds }
    }
}

impl From<VerificationOutcome> for VerifyResponse {
    fn from(o: VerificationOutcome) -> Self {
        let message = match (o.proof_valid, o.predicate_holds) {
            (true, true) => "balance meets the threshold",
            (true, false) => "predicate not met",
            (false, _) => "proof did not verify",
        };
        VerifyResponse {
            verified: o.verified,
            proof_valid: o.proof_valid,
            predicate_holds: o.predicate_holds,
            message: Some(message.to_string()),
        }
    }
}
