//! Crate-wide constants shared by the circuit, the gate, and the client.

/// Balance threshold enforced by the circuit, in cents.
///
/// The demo predicate is "balance is at least $1,000".
pub const THRESHOLD_CENTS: u64 = 100_000;

/// Bit width of the private balance witness.
///
/// Balances are range-constrained to `u64` so the comparison gadget cannot wrap.
pub const BALANCE_BITS: usize = 64;

/// Public signal value meaning the predicate holds.
///
/// The encoding is inverted on purpose: the circuit outputs `balance < threshold`,
/// so `0` is the success case.
pub const SIGNAL_PREDICATE_HOLDS: &str = "0";

/// Public signal value meaning the predicate does not hold.
pub const SIGNAL_PREDICATE_FAILS: &str = "1";

/// Fixed context tag sent by the client in `X-Balance-Source`.
pub const DEFAULT_SOURCE_TAG: &str = "EVERYDAY CHECKING-balance";

/// Session lifetime on the server.
pub const SESSION_TTL_SECS: u64 = 30 * 60;

/// Bearer credential lifetime.
pub const BEARER_TTL_SECS: u64 = 30 * 60;

/// Maximum age of a submission timestamp.
pub const REPLAY_WINDOW_MS: i64 = 5 * 60 * 1000;

/// Maximum amount a submission timestamp may sit in the future.
pub const MAX_FUTURE_SKEW_MS: i64 = 30 * 1000;

/// Default lifetime of client-side secure items.
pub const DEFAULT_ITEM_TTL_SECS: u64 = 30 * 60;

/// Lifetime of a stored, not yet submitted proof.
pub const PROOF_TTL_SECS: u64 = 5 * 60;
