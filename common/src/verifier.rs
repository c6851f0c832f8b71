//! Proof verification capability consumed by the gate.

use crate::groth16::{decode_proof, deserialize_vk, verify_balance_proof, ZkError};
use ark_bn254::Bn254;
use ark_groth16::{prepare_verifying_key, PreparedVerifyingKey, VerifyingKey};
use std::path::Path;

/// Checks a proof against its public signals.
///
/// Implementations hold their verification key; the gate only sees this call.
pub trait ProofVerifier: Send + Sync {
    /// `Ok(true)` if the proof checks out, `Ok(false)` if it does not.
    ///
    /// Errors for which [`ZkError::is_input_error`] holds are the caller's fault;
    /// anything else is an internal verifier failure.
    fn verify(&self, public_signals: &[String], proof: &str) -> Result<bool, ZkError>;
}

/// Groth16/BN254 verifier with a prepared key.
pub struct Groth16Verifier {
    pvk: PreparedVerifyingKey<Bn254>,
}

impl Groth16Verifier {
    pub fn new(vk: &VerifyingKey<Bn254>) -> Self {
        Self {
            pvk: prepare_verifying_key(vk),
        }
    }

    /// Load a compressed verification key written by the key setup.
    pub fn from_key_file(path: &Path) -> Result<Self, ZkError> {
        let bytes = std::fs::read(path)?;
        Ok(Self::new(&deserialize_vk(&bytes)?))
    }
}

impl ProofVerifier for Groth16Verifier {
    fn verify(&self, public_signals: &[String], proof: &str) -> Result<bool, ZkError> {
        let proof = decode_proof(proof)?;
        verify_balance_proof(&self.pvk, &proof, public_signals)
    }
}
