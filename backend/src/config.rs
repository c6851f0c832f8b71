//! Process configuration, read once from the environment.

use crate::errors::ApiError;
use rand::rngs::OsRng;
use rand::RngCore;
use std::path::PathBuf;
use std::time::Duration;
use zkbalance_common::constants::DEFAULT_SOURCE_TAG;

/// Where sessions and nonces live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    /// sqlx connection URL, e.g. `sqlite:data/gate.sqlite?mode=rwc`.
    Sqlite(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: String,
    pub data_dir: PathBuf,
    pub store: StoreBackend,
    pub token_secret: Vec<u8>,
    pub source_tag: String,
    pub sweep_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ApiError> {
        let addr = get("BACKEND_ADDR").unwrap_or_else(|| "127.0.0.1:3000".to_string());
        let data_dir = PathBuf::from(get("DATA_DIR").unwrap_or_else(|| "data".to_string()));

        let store = match get("STORE_URL").as_deref() {
            None | Some("memory") => StoreBackend::Memory,
            Some("sqlite") => StoreBackend::Sqlite(format!(
                "sqlite:{}?mode=rwc",
                data_dir.join("gate.sqlite").to_string_lossy()
            )),
            Some(url) if url.starts_with("sqlite:") => StoreBackend::Sqlite(url.to_string()),
            Some(other) => {
                return Err(ApiError::Validation(format!("unsupported STORE_URL: {other}")));
            }
        };

        let token_secret = match get("TOKEN_SECRET") {
            Some(s) if !s.is_empty() => s.into_bytes(),
            _ => {
                tracing::warn!("TOKEN_SECRET not set; bearer tokens will not survive a restart");
                let mut secret = vec![0u8; 32];
                OsRng.fill_bytes(&mut secret);
                secret
            }
        };

        let source_tag = get("BALANCE_SOURCE_TAG").unwrap_or_else(|| DEFAULT_SOURCE_TAG.to_string());

        let sweep_secs = match get("SWEEP_INTERVAL_SECS") {
            Some(v) => v
                .parse::<u64>()
                .ok()
                .filter(|s| *s > 0)
                .ok_or_else(|| ApiError::Validation(format!("invalid SWEEP_INTERVAL_SECS: {v}")))?,
            None => 60,
        };

        Ok(Self {
            addr,
            data_dir,
            store,
            token_secret,
            source_tag,
            sweep_interval: Duration::from_secs(sweep_secs),
        })
    }
}
