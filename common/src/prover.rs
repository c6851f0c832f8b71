//! Proof generation capability consumed by the client.

use crate::groth16::{deserialize_pk, prove_bundle, ZkError};
use crate::types::ProofBundle;
use ark_bn254::Bn254;
use ark_groth16::ProvingKey;
use rand::rngs::OsRng;
use std::path::Path;

/// Produces a threshold proof for a private balance.
///
/// Proving is CPU-bound and takes seconds; async callers should run it on a blocking thread.
pub trait ProofProver: Send + Sync {
    fn full_prove(&self, balance_cents: u64) -> Result<ProofBundle, ZkError>;
}

/// Groth16/BN254 prover backed by a proving key artifact.
pub struct Groth16Prover {
    pk: ProvingKey<Bn254>,
}

impl Groth16Prover {
    pub fn new(pk: ProvingKey<Bn254>) -> Self {
        Self { pk }
    }

    pub fn from_key_file(path: &Path) -> Result<Self, ZkError> {
        let bytes = std::fs::read(path)?;
        Ok(Self::new(deserialize_pk(&bytes)?))
    }
}

impl ProofProver for Groth16Prover {
    fn full_prove(&self, balance_cents: u64) -> Result<ProofBundle, ZkError> {
        // Use OS randomness for the proof to avoid deterministic proofs.
        let mut rng = OsRng;
        prove_bundle(&mut rng, &self.pk, balance_cents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::groth16::setup_keys;
    use crate::verifier::{Groth16Verifier, ProofVerifier};

    #[test]
    fn prover_and_verifier_agree() {
        let mut rng = ark_std::test_rng();
        let (pk, vk) = setup_keys(&mut rng).unwrap();
        let prover = Groth16Prover::new(pk);
        let verifier = Groth16Verifier::new(&vk);

        let bundle = prover.full_prove(250_000).unwrap();
        assert!(verifier.verify(&bundle.public_signals, &bundle.proof).unwrap());

        let err = verifier.verify(&bundle.public_signals, "AAAA").unwrap_err();
        assert!(err.is_input_error());
    }
}
