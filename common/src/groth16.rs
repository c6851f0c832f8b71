//! Groth16 prover/verifier orchestration for the threshold circuit.
//!
//! SECURITY NOTE (prototype): Groth16 requires a trusted setup that produces a proving key (PK)
//! and verifying key (VK). This prototype generates keys locally. In production, an MPC ceremony
//! (or a transparent system) should be used.

use crate::circuit::{expected_output, BalanceThresholdCircuit};
use crate::types::{decimal_to_field, field_to_decimal, ProofBundle};
use ark_bn254::{Bn254, Fr};
use ark_groth16::{Groth16, PreparedVerifyingKey, Proof, ProvingKey, VerifyingKey};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use base64::Engine;
use rand::RngCore;
use thiserror::Error;

/// Number of public signals the circuit exposes.
pub const NUM_PUBLIC_SIGNALS: usize = 1;

#[derive(Debug, Error)]
pub enum ZkError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid proof encoding: {0}")]
    InvalidProof(String),

    #[error("invalid public signals: {0}")]
    InvalidSignals(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("arkworks error: {0}")]
    Ark(String),
}

impl ZkError {
    /// Whether the error stems from caller-supplied input rather than the proof system.
    pub fn is_input_error(&self) -> bool {
        matches!(self, ZkError::InvalidProof(_) | ZkError::InvalidSignals(_))
    }
}

/// Convert decimal public signals into the public-input vector expected by Groth16.
///
/// ORDERING MUST MATCH the circuit's `new_input` allocation order.
pub fn public_inputs_from_signals(signals: &[String]) -> Result<Vec<Fr>, ZkError> {
    if signals.len() != NUM_PUBLIC_SIGNALS {
        return Err(ZkError::InvalidSignals(format!(
            "expected {NUM_PUBLIC_SIGNALS} public signal(s), got {}",
            signals.len()
        )));
    }
    signals
        .iter()
        .map(|s| decimal_to_field(s).ok_or_else(|| ZkError::InvalidSignals(format!("not a field element: {s:?}"))))
        .collect()
}

/// Generate a Groth16 keypair for the threshold circuit.
pub fn setup_keys(rng: &mut impl RngCore) -> Result<(ProvingKey<Bn254>, VerifyingKey<Bn254>), ZkError> {
    // Constraints do not depend on the witness.
    let circuit = BalanceThresholdCircuit::for_balance(0);

    let pk = Groth16::<Bn254>::generate_random_parameters_with_reduction(circuit, rng)
        .map_err(|e| ZkError::Ark(format!("{e}")))?;

    let vk = pk.vk.clone();
    Ok((pk, vk))
}

/// Prove the threshold predicate for a private balance.
pub fn prove_balance(
    rng: &mut impl RngCore,
    pk: &ProvingKey<Bn254>,
    balance_cents: u64,
) -> Result<(Proof<Bn254>, Vec<String>), ZkError> {
    let circuit = BalanceThresholdCircuit::for_balance(balance_cents);
    let proof = Groth16::<Bn254>::create_random_proof_with_reduction(circuit, pk, rng)
        .map_err(|e| ZkError::Ark(format!("{e}")))?;

    Ok((proof, vec![field_to_decimal(&expected_output(balance_cents))]))
}

/// Verify a threshold proof against its public signals.
///
/// `Ok(false)` means the proof is well-formed but does not check out.
pub fn verify_balance_proof(
    pvk: &PreparedVerifyingKey<Bn254>,
    proof: &Proof<Bn254>,
    signals: &[String],
) -> Result<bool, ZkError> {
    let public_inputs = public_inputs_from_signals(signals)?;
    Groth16::<Bn254>::verify_proof(pvk, proof, &public_inputs).map_err(|e| ZkError::Ark(format!("{e}")))
}

/// Serialize a proving key to bytes.
pub fn serialize_pk(pk: &ProvingKey<Bn254>) -> Result<Vec<u8>, ZkError> {
    let mut out = Vec::new();
    pk.serialize_compressed(&mut out)
        .map_err(|e| ZkError::Serialization(format!("{e}")))?;
    Ok(out)
}

pub fn deserialize_pk(bytes: &[u8]) -> Result<ProvingKey<Bn254>, ZkError> {
    ProvingKey::<Bn254>::deserialize_compressed(bytes)
        .map_err(|e| ZkError::Serialization(format!("{e}")))
}

pub fn serialize_vk(vk: &VerifyingKey<Bn254>) -> Result<Vec<u8>, ZkError> {
    let mut out = Vec::new();
    vk.serialize_compressed(&mut out)
        .map_err(|e| ZkError::Serialization(format!("{e}")))?;
    Ok(out)
}

pub fn deserialize_vk(bytes: &[u8]) -> Result<VerifyingKey<Bn254>, ZkError> {
    VerifyingKey::<Bn254>::deserialize_compressed(bytes)
        .map_err(|e| ZkError::Serialization(format!("{e}")))
}

/// Encode a proof as the base64 string carried in [`ProofBundle::proof`].
pub fn encode_proof(proof: &Proof<Bn254>) -> Result<String, ZkError> {
    let mut out = Vec::new();
    proof
        .serialize_compressed(&mut out)
        .map_err(|e| ZkError::Serialization(format!("{e}")))?;
    Ok(base64::engine::general_purpose::STANDARD.encode(out))
}

pub fn decode_proof(b64: &str) -> Result<Proof<Bn254>, ZkError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(b64)
        .map_err(|e| ZkError::InvalidProof(format!("{e}")))?;
    Proof::<Bn254>::deserialize_compressed(&bytes[..]).map_err(|e| ZkError::InvalidProof(format!("{e}")))
}

/// Prove and package the result for transport.
pub fn prove_bundle(rng: &mut impl RngCore, pk: &ProvingKey<Bn254>, balance_cents: u64) -> Result<ProofBundle, ZkError> {
    let (proof, public_signals) = prove_balance(rng, pk, balance_cents)?;
    Ok(ProofBundle {
        proof: encode_proof(&proof)?,
        public_signals,
    })
}
