//! Types shared between the prover, the gate, and the client.

use ark_bn254::Fr;
use ark_ff::PrimeField;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A proof and its disclosed outputs, as produced by the prover and posted to `/verify`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofBundle {
    /// Base64 of the compressed Groth16 proof. Opaque to everything but the verifier.
    pub proof: String,

    /// Public signals as decimal field-element strings, in circuit input order.
    #[serde(rename = "publicSignals")]
    pub public_signals: Vec<String>,
}

/// Encode a field element the way public signals travel: as a decimal integer.
pub fn field_to_decimal(x: &Fr) -> String {
    x.into_bigint().to_string()
}

/// Parse a decimal public signal back into a field element.
///
/// Leading zeros, signs and blanks are rejected so each element has a single encoding.
pub fn decimal_to_field(s: &str) -> Option<Fr> {
    let canonical = !s.is_empty()
        && s.bytes().all(|b| b.is_ascii_digit())
        && (s == "0" || !s.starts_with('0'));
    if !canonical {
        return None;
    }
    let x = Fr::from_str(s).ok()?;
    // Values at or above the modulus would silently reduce.
    (field_to_decimal(&x) == s).then_some(x)
}
