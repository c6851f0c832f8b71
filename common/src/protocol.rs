//! HTTP wire format shared by the gate and its clients.

use serde::{Deserialize, Serialize};

pub const PATH_INIT_SESSION: &str = "/init-session";
pub const PATH_TOKEN: &str = "/oauth/token";
pub const PATH_VERIFY: &str = "/verify";

pub const HEADER_REQUEST_ID: &str = "x-request-id";
pub const HEADER_TIMESTAMP: &str = "x-timestamp";
pub const HEADER_BALANCE_SOURCE: &str = "x-balance-source";

pub const TOKEN_TYPE_BEARER: &str = "Bearer";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitSessionResponse {
    #[serde(rename = "sessionToken")]
    pub session_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRequest {
    pub session_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    /// Lifetime of `access_token` in seconds.
    pub expires_in: u64,
}

/// `/verify` body. Fields are optional so a missing one is a validation error, not a
/// deserialization rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub proof: Option<String>,
    #[serde(rename = "publicSignals")]
    pub public_signals: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResponse {
    /// True iff the proof checked out and the predicate holds.
    pub verified: bool,
    #[serde(rename = "proofValid")]
    pub proof_valid: bool,
    #[serde(rename = "predicateHolds")]
    pub predicate_holds: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub message: Option<String>,
}

/// Machine-readable class of a rejected request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Validation,
    Auth,
    Replay,
    MalformedSignal,
    Verifier,
    Internal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: ErrorCode,
}
