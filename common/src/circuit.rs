//! R1CS circuit for the balance threshold predicate.
//!
//! What this circuit proves:
//! 1) The prover knows a private balance `b` (in cents) that fits in 64 bits.
//! 2) The public output `out` equals `1` if `b < THRESHOLD_CENTS` and `0` otherwise.
//!
//! Privacy: the balance is a witness (never public). Only `out` is disclosed.

use crate::constants::{BALANCE_BITS, THRESHOLD_CENTS};
use ark_bn254::Fr;
use ark_r1cs_std::alloc::AllocVar;
use ark_r1cs_std::boolean::Boolean;
use ark_r1cs_std::convert::ToBitsGadget;
use ark_r1cs_std::eq::EqGadget;
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::fields::FieldVar;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};

/// Convert little-endian boolean bits into an FpVar.
fn bits_le_to_fp(bits_le: &[Boolean<Fr>]) -> Result<FpVar<Fr>, SynthesisError> {
    let mut acc = FpVar::<Fr>::constant(Fr::from(0u64));
    let mut coeff = FpVar::<Fr>::constant(Fr::from(1u64));

    for b in bits_le {
        // b ? coeff : 0
        let term = b.select(&coeff, &FpVar::<Fr>::constant(Fr::from(0u64)))?;
        acc += term;
        coeff += coeff.clone();
    }

    Ok(acc)
}

/// Enforce that `v` fits in `n` bits and return its `n` little-endian bits.
fn constrain_bits(v: &FpVar<Fr>, n: usize) -> Result<Vec<Boolean<Fr>>, SynthesisError> {
    let bits = v.to_bits_le()?;
    let low = bits[..n].to_vec();
    let reconstructed = bits_le_to_fp(&low)?;
    reconstructed.enforce_equal(v)?;
    Ok(low)
}

/// Boolean gadget: `a >= c` for a 64-bit `a` and a constant `c`.
///
/// `a + (2^64 - c)` fits in 65 bits; its top bit is set exactly when `a >= c`.
fn geq_const_u64(a: &FpVar<Fr>, c: u64) -> Result<Boolean<Fr>, SynthesisError> {
    let offset = Fr::from((1u128 << BALANCE_BITS) - u128::from(c));
    let shifted = a.clone() + FpVar::<Fr>::constant(offset);
    let bits = constrain_bits(&shifted, BALANCE_BITS + 1)?;
    Ok(bits[BALANCE_BITS].clone())
}

/// Circuit proving the threshold predicate over a private balance.
#[derive(Clone, Debug)]
pub struct BalanceThresholdCircuit {
    /// Private balance in cents.
    pub balance_cents: u64,

    /// Public output: 0 when the balance meets the threshold, 1 otherwise.
    pub public_out: Fr,
}

impl BalanceThresholdCircuit {
    /// Build a circuit whose public output is consistent with `balance_cents`.
    pub fn for_balance(balance_cents: u64) -> Self {
        Self {
            balance_cents,
            public_out: expected_output(balance_cents),
        }
    }
}

/// Host-side evaluation of the circuit output.
///
/// This MUST match the circuit's logic.
pub fn expected_output(balance_cents: u64) -> Fr {
    if balance_cents < THRESHOLD_CENTS {
        Fr::from(1u64)
    } else {
        Fr::from(0u64)
    }
}

impl ConstraintSynthesizer<Fr> for BalanceThresholdCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        // --- Public inputs ---
        // IMPORTANT: ordering MUST match `groth16::public_inputs_from_signals`.
        let public_out = FpVar::<Fr>::new_input(cs.clone(), || Ok(self.public_out))?;

        // --- Witness ---
        let balance = FpVar::<Fr>::new_witness(cs.clone(), || Ok(Fr::from(self.balance_cents)))?;
        let _balance_bits = constrain_bits(&balance, BALANCE_BITS)?;

        // out = meets ? 0 : 1
        let meets = geq_const_u64(&balance, THRESHOLD_CENTS)?;
        let out = meets.select(
            &FpVar::<Fr>::constant(Fr::from(0u64)),
            &FpVar::<Fr>::constant(Fr::from(1u64)),
        )?;
        out.enforce_equal(&public_out)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_relations::r1cs::ConstraintSystem;

    fn satisfied(circuit: BalanceThresholdCircuit) -> bool {
        let cs = ConstraintSystem::<Fr>::new_ref();
        circuit.generate_constraints(cs.clone()).unwrap();
        cs.is_satisfied().unwrap()
    }

    #[test]
    fn honest_outputs_satisfy() {
        for balance in [0, 1, THRESHOLD_CENTS - 1, THRESHOLD_CENTS, 123_456, u64::MAX] {
            assert!(satisfied(BalanceThresholdCircuit::for_balance(balance)), "balance {balance}");
        }
    }

    #[test]
    fn lying_about_the_output_is_unsatisfiable() {
        let circuit = BalanceThresholdCircuit {
            balance_cents: 500,
            public_out: Fr::from(0u64),
        };
        assert!(!satisfied(circuit));

        let circuit = BalanceThresholdCircuit {
            balance_cents: THRESHOLD_CENTS,
            public_out: Fr::from(1u64),
        };
        assert!(!satisfied(circuit));
    }
}
