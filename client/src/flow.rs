//! Client authentication and submission state machine.
//!
//! ```text
//! Unauthenticated -> SessionPending -> Authenticated -> ProofReady -> Verified
//!                                                                  -> PredicateNotMet
//!                                                                  -> ProofRejected
//! proof generation error -> Failed
//! verifier failure -> Authenticated (proof discarded)
//! replay or validation rejection -> ProofReady (proof kept)
//! any auth rejection -> Unauthenticated (both tokens purged)
//! ```

use crate::api::{GateApi, SubmissionHeaders};
use crate::error::ClientError;
use crate::extractor::BalanceExtractor;
use crate::proof_client::{GeneratedProof, ProofGenerationClient};
use crate::secure_store::SecureStore;
use std::sync::Arc;
use std::time::Duration;
use zkbalance_common::clock::Clock;
use zkbalance_common::constants::DEFAULT_SOURCE_TAG;

pub const SESSION_TOKEN: &str = "session_token";
pub const AUTH_TOKEN: &str = "auth_token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Unauthenticated,
    SessionPending,
    Authenticated,
    ProofReady,
    Verified,
    PredicateNotMet,
    /// The gate answered, but the proof failed its cryptographic check.
    ProofRejected,
    Failed,
}

/// What the gate decided about a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Verified,
    PredicateNotMet,
    /// The proof did not check out cryptographically.
    ProofRejected,
}

pub struct ClientSession<A: GateApi> {
    api: A,
    store: Arc<SecureStore>,
    proofs: ProofGenerationClient,
    clock: Arc<dyn Clock>,
    source_tag: String,
    state: ClientState,
}

impl<A: GateApi> ClientSession<A> {
    pub fn new(api: A, store: Arc<SecureStore>, proofs: ProofGenerationClient, clock: Arc<dyn Clock>) -> Self {
        Self {
            api,
            store,
            proofs,
            clock,
            source_tag: DEFAULT_SOURCE_TAG.to_string(),
            state: ClientState::Unauthenticated,
        }
    }

    pub fn with_source_tag(mut self, tag: impl Into<String>) -> Self {
        self.source_tag = tag.into();
        self
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Submission is possible while a bearer credential is held.
    pub fn can_submit(&self) -> bool {
        matches!(self.store.get_secure_item::<String>(AUTH_TOKEN), Ok(Some(_)))
    }

    fn purge_credentials(&mut self) -> Result<(), ClientError> {
        self.store.remove_secure_item(AUTH_TOKEN)?;
        self.store.remove_secure_item(SESSION_TOKEN)?;
        self.state = ClientState::Unauthenticated;
        Ok(())
    }

    /// Make sure a bearer credential is held, reusing whatever is still live.
    pub async fn authenticate(&mut self) -> Result<(), ClientError> {
        if self.store.get_secure_item::<String>(AUTH_TOKEN)?.is_some() {
            if self.state == ClientState::Unauthenticated {
                self.state = ClientState::Authenticated;
            }
            return Ok(());
        }

        self.state = ClientState::SessionPending;

        let session_token = match self.store.get_secure_item::<String>(SESSION_TOKEN)? {
            Some(token) => token,
            None => match self.api.init_session().await {
                Ok(token) => {
                    self.store.set_secure_item(SESSION_TOKEN, &token)?;
                    token
                }
                Err(e) => {
                    self.state = ClientState::Unauthenticated;
                    return Err(e);
                }
            },
        };

        let token = match self.api.exchange_token(&session_token).await {
            Ok(token) => token,
            Err(e) => {
                if e.is_auth() {
                    // The session is gone server-side; the next attempt starts over.
                    self.store.remove_secure_item(SESSION_TOKEN)?;
                }
                tracing::warn!(error = %e, "token exchange failed");
                self.state = ClientState::Unauthenticated;
                return Err(e);
            }
        };

        self.store
            .set_secure_item_with_ttl(AUTH_TOKEN, &token.access_token, Duration::from_secs(token.expires_in))?;
        self.state = ClientState::Authenticated;
        Ok(())
    }

    pub async fn generate_proof(&mut self, extractor: &dyn BalanceExtractor) -> Result<GeneratedProof, ClientError> {
        match self.proofs.generate(extractor).await {
            Ok(generated) => {
                self.state = ClientState::ProofReady;
                Ok(generated)
            }
            Err(e) => {
                tracing::warn!(error = %e, "proof generation failed");
                self.state = ClientState::Failed;
                Err(e)
            }
        }
    }

    /// Post the stored proof with a fresh request id and timestamp.
    pub async fn submit(&mut self) -> Result<SubmitOutcome, ClientError> {
        let Some(bundle) = self.proofs.current_proof()? else {
            return Err(ClientError::Validation("no proof available, generate one first".to_string()));
        };

        let Some(bearer) = self.store.get_secure_item::<String>(AUTH_TOKEN)? else {
            self.purge_credentials()?;
            return Err(ClientError::Auth("not authenticated".to_string()));
        };

        let headers = SubmissionHeaders {
            request_id: uuid::Uuid::new_v4().to_string(),
            timestamp_ms: self.clock.now_ms(),
            source_tag: self.source_tag.clone(),
        };

        let response = match self.api.verify(&bearer, &headers, &bundle).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(request_id = %headers.request_id, error = %e, "submission failed");
                match &e {
                    ClientError::Auth(_) => self.purge_credentials()?,
                    ClientError::Verifier(_) => {
                        // A retry needs a fresh proof as well as a fresh request id.
                        self.proofs.discard_proof()?;
                        self.state = ClientState::Authenticated;
                    }
                    // The proof is not bound to the request id; it can be resubmitted.
                    _ => self.state = ClientState::ProofReady,
                }
                return Err(e);
            }
        };

        self.proofs.discard_proof()?;

        let outcome = if response.verified {
            SubmitOutcome::Verified
        } else if response.proof_valid {
            SubmitOutcome::PredicateNotMet
        } else {
            SubmitOutcome::ProofRejected
        };
        self.state = match outcome {
            SubmitOutcome::Verified => ClientState::Verified,
            SubmitOutcome::PredicateNotMet => ClientState::PredicateNotMet,
            SubmitOutcome::ProofRejected => ClientState::ProofRejected,
        };
        tracing::info!(request_id = %headers.request_id, ?outcome, "submission decided");
        Ok(outcome)
    }
}
