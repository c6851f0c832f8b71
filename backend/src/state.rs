use crate::config::{Config, StoreBackend};
use crate::db::SqliteStore;
use crate::errors::ApiError;
use crate::gate::VerificationGate;
use crate::replay::ReplayGuard;
use crate::session::SessionService;
use crate::store::{MemoryStore, Store};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use zkbalance_common::clock::Clock;
use zkbalance_common::constants::{BEARER_TTL_SECS, MAX_FUTURE_SKEW_MS, REPLAY_WINDOW_MS, SESSION_TTL_SECS};
use zkbalance_common::groth16::{serialize_pk, serialize_vk, setup_keys};
use zkbalance_common::verifier::{Groth16Verifier, ProofVerifier};

use rand::rngs::OsRng;

pub const PROVING_KEY_FILE: &str = "groth16_pk.bin";
pub const VERIFYING_KEY_FILE: &str = "groth16_vk.bin";

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionService>,
    pub replay: Arc<ReplayGuard>,
    pub gate: Arc<VerificationGate>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        verifier: Arc<dyn ProofVerifier>,
        token_secret: &[u8],
        source_tag: &str,
    ) -> Self {
        let sessions = Arc::new(SessionService::new(
            store.clone(),
            clock.clone(),
            token_secret,
            SESSION_TTL_SECS,
            BEARER_TTL_SECS,
        ));
        let replay = Arc::new(ReplayGuard::new(
            store,
            clock,
            source_tag,
            REPLAY_WINDOW_MS,
            MAX_FUTURE_SKEW_MS,
        ));
        let gate = Arc::new(VerificationGate::new(sessions.clone(), replay.clone(), verifier));

        Self { sessions, replay, gate }
    }
}

/// Open the store selected by the configuration.
pub async fn open_store(config: &Config) -> Result<Arc<dyn Store>, ApiError> {
    Ok(match &config.store {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::Sqlite(url) => Arc::new(SqliteStore::open(url).await?),
    })
}

/// Ensure Groth16 keys exist on disk and load the verifier from them.
///
/// This runs the trusted setup (prototype) on first start. The proving key is left next to
/// the verifying key for clients to pick up.
pub async fn ensure_keys(data_dir: &Path) -> Result<Groth16Verifier, ApiError> {
    let keys_dir: PathBuf = data_dir.join("keys");

    tokio::task::spawn_blocking(move || {
        std::fs::create_dir_all(&keys_dir).map_err(|_| ApiError::Internal)?;

        let pk_path = keys_dir.join(PROVING_KEY_FILE);
        let vk_path = keys_dir.join(VERIFYING_KEY_FILE);

        if !vk_path.exists() {
            // Trusted setup randomness (prototype).
            //
            // IMPORTANT: In production, use MPC setup or a transparent proof system.
            let mut rng = OsRng;
            let (pk, vk) = setup_keys(&mut rng).map_err(|_| ApiError::Internal)?;

            let pk_bytes = serialize_pk(&pk).map_err(|_| ApiError::Internal)?;
            let vk_bytes = serialize_vk(&vk).map_err(|_| ApiError::Internal)?;

            std::fs::write(&pk_path, pk_bytes).map_err(|_| ApiError::Internal)?;
            std::fs::write(&vk_path, vk_bytes).map_err(|_| ApiError::Internal)?;
            tracing::info!(path = %keys_dir.display(), "generated new groth16 keys");
        }

        Groth16Verifier::from_key_file(&vk_path).map_err(|e| {
            tracing::error!(error = %e, "failed to load verifying key");
            ApiError::Internal
        })
    })
    .await
    .map_err(|_| ApiError::Internal)?
}
