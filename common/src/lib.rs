//! Shared layer for the balance attestation gate.
//!
//! This crate contains:
//! - A SNARK circuit proving `balance >= threshold` over a private balance.
//! - Prover + verifier orchestration and the capability traits the gate and client consume.
//! - The HTTP wire types and protocol constants.
//! - The clock abstraction every expiry check goes through.

pub mod circuit;
pub mod clock;
pub mod constants;
pub mod groth16;
pub mod protocol;
pub mod prover;
pub mod types;
pub mod verifier;
