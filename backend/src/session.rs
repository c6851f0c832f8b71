//! Session issuance, token exchange, and bearer authentication.

use crate::errors::{ApiError, AuthError};
use crate::models::{BearerClaims, IssuedToken, SessionRecord};
use crate::store::Store;
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use rand::RngCore;
use std::sync::Arc;
use tracing::{info, warn};
use zkbalance_common::clock::Clock;

/// Attempts before giving up on finding an unused session id.
const MAX_ID_ATTEMPTS: usize = 4;

fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub struct SessionService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    session_ttl_secs: u64,
    bearer_ttl_secs: u64,
}

impl SessionService {
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        token_secret: &[u8],
        session_ttl_secs: u64,
        bearer_ttl_secs: u64,
    ) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against the injected clock, not the library's system time.
        validation.validate_exp = false;
        validation.leeway = 0;

        Self {
            store,
            clock,
            encoding_key: EncodingKey::from_secret(token_secret),
            decoding_key: DecodingKey::from_secret(token_secret),
            validation,
            session_ttl_secs,
            bearer_ttl_secs,
        }
    }

    /// Create an anonymous session and return its id.
    pub async fn init_session(&self) -> Result<String, ApiError> {
        let now = self.clock.now_ms();
        let ttl_ms = i64::try_from(self.session_ttl_secs * 1000).map_err(|_| ApiError::Internal)?;

        for _ in 0..MAX_ID_ATTEMPTS {
            let record = SessionRecord {
                id: random_hex(32),
                secret: random_hex(32),
                created_at: now,
                expires_at: now + ttl_ms,
            };
            let id = record.id.clone();
            let expires_at = record.expires_at;
            if self.store.put_session(record).await? {
                info!(session = %short(&id), expires_at = %rfc3339(expires_at), "session issued");
                return Ok(id);
            }
        }

        tracing::error!("could not allocate an unused session id");
        Err(ApiError::Internal)
    }

    /// Look up a session that is present and unexpired.
    ///
    /// An expired record found here is deleted on the spot.
    async fn live_session(&self, session_id: &str) -> Result<Option<SessionRecord>, ApiError> {
        let Some(record) = self.store.get_session(session_id).await? else {
            return Ok(None);
        };
        if !record.is_live(self.clock.now_ms()) {
            self.store.delete_session(session_id).await?;
            return Ok(None);
        }
        Ok(Some(record))
    }

    /// Mint a bearer credential for a live session. The session itself is left untouched.
    pub async fn exchange_token(&self, session_id: &str) -> Result<IssuedToken, ApiError> {
        let Some(record) = self.live_session(session_id).await? else {
            warn!(session = %short(session_id), "token exchange for unknown or expired session");
            return Err(AuthError::SessionInvalid.into());
        };

        let iat = self.clock.now_ms() / 1000;
        let exp = iat + i64::try_from(self.bearer_ttl_secs).map_err(|_| ApiError::Internal)?;
        let claims = BearerClaims { sub: record.id, iat, exp };

        let access_token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!(error = %e, "failed to sign bearer token");
            ApiError::Internal
        })?;

        info!(session = %short(session_id), expires_at = %rfc3339(exp * 1000), "bearer token issued");
        Ok(IssuedToken {
            access_token,
            expires_in: self.bearer_ttl_secs,
        })
    }

    /// Check the signature, the credential's own expiry, then that its session is still live.
    pub async fn authenticate(&self, token: &str) -> Result<BearerClaims, ApiError> {
        let claims = match decode::<BearerClaims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => data.claims,
            Err(e) if matches!(e.kind(), ErrorKind::ExpiredSignature) => return Err(AuthError::Expired.into()),
            Err(_) => return Err(AuthError::Invalid.into()),
        };

        if self.clock.now_ms() >= claims.exp.saturating_mul(1000) {
            return Err(AuthError::Expired.into());
        }

        if self.live_session(&claims.sub).await?.is_none() {
            return Err(AuthError::Expired.into());
        }

        Ok(claims)
    }
}

fn rfc3339(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| ms.to_string())
}

/// Log-safe prefix of a session id.
fn short(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
