//! Proof generation: extract, encode the private input, prove, stash.

use crate::error::ClientError;
use crate::extractor::{parse_balance_cents, BalanceExtractor};
use crate::secure_store::SecureStore;
use std::sync::Arc;
use std::time::Duration;
use zkbalance_common::constants::PROOF_TTL_SECS;
use zkbalance_common::prover::ProofProver;
use zkbalance_common::types::ProofBundle;

/// Secure store slot of the proof waiting to be submitted.
pub const CURRENT_PROOF: &str = "current_proof";

/// A freshly generated, stored proof. Only the display string is kept; cents never leave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedProof {
    pub display_balance: String,
}

pub struct ProofGenerationClient {
    prover: Arc<dyn ProofProver>,
    store: Arc<SecureStore>,
}

impl ProofGenerationClient {
    pub fn new(prover: Arc<dyn ProofProver>, store: Arc<SecureStore>) -> Self {
        Self { prover, store }
    }

    pub async fn generate(&self, extractor: &dyn BalanceExtractor) -> Result<GeneratedProof, ClientError> {
        let display_balance = extractor
            .extract()
            .ok_or_else(|| ClientError::Validation("could not read balance from page data".to_string()))?;
        let balance_cents = parse_balance_cents(&display_balance)?;

        let prover = self.prover.clone();
        let bundle = tokio::task::spawn_blocking(move || prover.full_prove(balance_cents))
            .await
            .map_err(|e| ClientError::Prover(format!("prover task failed: {e}")))?
            .map_err(|e| ClientError::Prover(e.to_string()))?;

        self.store
            .set_secure_item_with_ttl(CURRENT_PROOF, &bundle, Duration::from_secs(PROOF_TTL_SECS))?;
        tracing::info!("balance proof generated");

        Ok(GeneratedProof { display_balance })
    }

    pub fn current_proof(&self) -> Result<Option<ProofBundle>, ClientError> {
        Ok(self.store.get_secure_item(CURRENT_PROOF)?)
    }

    pub fn discard_proof(&self) -> Result<(), ClientError> {
        Ok(self.store.remove_secure_item(CURRENT_PROOF)?)
    }
}
