//! Client side of the balance attestation gate.
//!
//! - [`secure_store`]: AES-GCM sealed, expiring storage for tokens and pending proofs.
//! - [`extractor`]: reads the balance off the account page and parses it into cents.
//! - [`proof_client`]: turns a balance into a stored proof without disclosing it.
//! - [`flow`]: authentication and submission against the gate over [`api`].

pub mod api;
pub mod error;
pub mod extractor;
pub mod flow;
pub mod proof_client;
pub mod secure_store;
pub mod storage;

pub use error::{ClientError, StoreError};
