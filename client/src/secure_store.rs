//! Encrypted, expiring key/value store for client-side secrets.
//!
//! Values are JSON-serialized, sealed with AES-256-GCM under a key kept in the persistent
//! local area, and written to the volatile session area together with an absolute expiry.
//! The item name is bound as associated data, so a ciphertext moved to another slot fails
//! to open.

use crate::error::StoreError;
use crate::storage::StorageArea;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use zkbalance_common::clock::{duration_ms, Clock};
use zkbalance_common::constants::DEFAULT_ITEM_TTL_SECS;

/// Slot in the local area that holds the raw 256-bit key.
pub const ENCRYPTION_KEY_SLOT: &str = "encryption_key";

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

#[derive(Debug, Serialize, Deserialize)]
struct SealedItem {
    /// base64 of `nonce || ciphertext || tag`.
    data: String,
    #[serde(rename = "expiresAt")]
    expires_at: i64,
}

pub struct SecureStore {
    local: Arc<dyn StorageArea>,
    session: Arc<dyn StorageArea>,
    clock: Arc<dyn Clock>,
    // Serializes key creation within this process.
    key_lock: Mutex<()>,
}

impl SecureStore {
    pub fn new(local: Arc<dyn StorageArea>, session: Arc<dyn StorageArea>, clock: Arc<dyn Clock>) -> Self {
        Self {
            local,
            session,
            clock,
            key_lock: Mutex::new(()),
        }
    }

    fn existing_key(&self) -> Result<Option<Aes256Gcm>, StoreError> {
        let Some(raw) = self.local.get(ENCRYPTION_KEY_SLOT)? else {
            return Ok(None);
        };
        Aes256Gcm::new_from_slice(&raw)
            .map(Some)
            .map_err(|_| StoreError::Corrupt(format!("encryption key has {} bytes", raw.len())))
    }

    fn key_or_create(&self) -> Result<Aes256Gcm, StoreError> {
        let _guard = self.key_lock.lock().map_err(|_| StoreError::Poisoned)?;
        if let Some(cipher) = self.existing_key()? {
            return Ok(cipher);
        }

        let mut raw = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut raw);
        self.local.set(ENCRYPTION_KEY_SLOT, raw.to_vec())?;
        tracing::debug!("generated client encryption key");
        Aes256Gcm::new_from_slice(&raw).map_err(|_| StoreError::Corrupt("encryption key".to_string()))
    }

    /// Store `value` under `key` for the default 30 minutes.
    pub fn set_secure_item<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        self.set_secure_item_with_ttl(key, value, Duration::from_secs(DEFAULT_ITEM_TTL_SECS))
    }

    pub fn set_secure_item_with_ttl<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let cipher = self.key_or_create()?;
        let plaintext = serde_json::to_vec(value).map_err(|e| StoreError::Serialization(e.to_string()))?;

        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let sealed = cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: &plaintext,
                    aad: key.as_bytes(),
                },
            )
            .map_err(|_| StoreError::Serialization("encryption failed".to_string()))?;

        let mut data = Vec::with_capacity(NONCE_LEN + sealed.len());
        data.extend_from_slice(&nonce);
        data.extend_from_slice(&sealed);

        let item = SealedItem {
            data: base64::engine::general_purpose::STANDARD.encode(data),
            expires_at: self.clock.now_ms().saturating_add(duration_ms(ttl)),
        };
        let bytes = serde_json::to_vec(&item).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.session.set(key, bytes)
    }

    /// Read an unexpired item.
    ///
    /// Missing, expired, and key-less items all read as `None`; expired ones are purged.
    /// An item that fails authentication is purged and reported as [`StoreError::Decrypt`].
    pub fn get_secure_item<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let Some(bytes) = self.session.get(key)? else {
            return Ok(None);
        };

        let item: SealedItem = match serde_json::from_slice(&bytes) {
            Ok(item) => item,
            Err(e) => {
                self.session.remove(key)?;
                return Err(StoreError::Corrupt(e.to_string()));
            }
        };

        if self.clock.now_ms() > item.expires_at {
            self.session.remove(key)?;
            return Ok(None);
        }

        let Some(cipher) = self.existing_key()? else {
            // Sealed under a key that no longer exists.
            self.session.remove(key)?;
            return Ok(None);
        };

        let plaintext = base64::engine::general_purpose::STANDARD
            .decode(&item.data)
            .ok()
            .filter(|data| data.len() > NONCE_LEN)
            .and_then(|data| {
                let (nonce, sealed) = data.split_at(NONCE_LEN);
                cipher
                    .decrypt(
                        Nonce::from_slice(nonce),
                        Payload {
                            msg: sealed,
                            aad: key.as_bytes(),
                        },
                    )
                    .ok()
            });

        let Some(plaintext) = plaintext else {
            tracing::warn!(item = key, "discarding secure item that failed to open");
            self.session.remove(key)?;
            return Err(StoreError::Decrypt);
        };

        serde_json::from_slice(&plaintext)
            .map(Some)
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }

    pub fn remove_secure_item(&self, key: &str) -> Result<(), StoreError> {
        self.session.remove(key)
    }

    /// Drop every session item. The encryption key survives.
    pub fn end_session(&self) -> Result<(), StoreError> {
        self.session.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryArea;
    use zkbalance_common::clock::ManualClock;

    const T0: i64 = 1_700_000_000_000;

    struct Fixture {
        store: SecureStore,
        local: Arc<MemoryArea>,
        session: Arc<MemoryArea>,
        clock: Arc<ManualClock>,
    }

    fn fixture() -> Fixture {
        let local = Arc::new(MemoryArea::new());
        let session = Arc::new(MemoryArea::new());
        let clock = Arc::new(ManualClock::new(T0));
        let store = SecureStore::new(local.clone(), session.clone(), clock.clone());
        Fixture { store, local, session, clock }
    }

    #[test]
    fn items_round_trip_until_they_expire() {
        let f = fixture();
        f.store.set_secure_item_with_ttl("auth_token", "abc", Duration::from_secs(60)).unwrap();
        assert_eq!(f.store.get_secure_item::<String>("auth_token").unwrap().as_deref(), Some("abc"));

        f.clock.advance(Duration::from_secs(60));
        assert!(f.store.get_secure_item::<String>("auth_token").unwrap().is_some());

        f.clock.advance(Duration::from_millis(1));
        assert_eq!(f.store.get_secure_item::<String>("auth_token").unwrap(), None);
        // Expired items are purged on read.
        assert_eq!(f.session.get("auth_token").unwrap(), None);
    }

    #[test]
    fn default_ttl_is_thirty_minutes() {
        let f = fixture();
        f.store.set_secure_item("session_token", &42u32).unwrap();
        f.clock.advance(Duration::from_secs(30 * 60));
        assert_eq!(f.store.get_secure_item::<u32>("session_token").unwrap(), Some(42));
        f.clock.advance(Duration::from_secs(1));
        assert_eq!(f.store.get_secure_item::<u32>("session_token").unwrap(), None);
    }

    #[test]
    fn plaintext_never_reaches_storage() {
        let f = fixture();
        f.store.set_secure_item("auth_token", "super-secret-token").unwrap();
        let raw = f.session.get("auth_token").unwrap().unwrap();
        let raw = String::from_utf8_lossy(&raw);
        assert!(!raw.contains("super-secret-token"));
    }

    #[test]
    fn key_is_created_once_and_survives_session_end() {
        let f = fixture();
        assert_eq!(f.local.get(ENCRYPTION_KEY_SLOT).unwrap(), None);

        f.store.set_secure_item("a", "1").unwrap();
        let key = f.local.get(ENCRYPTION_KEY_SLOT).unwrap().unwrap();
        assert_eq!(key.len(), KEY_LEN);

        f.store.set_secure_item("b", "2").unwrap();
        assert_eq!(f.local.get(ENCRYPTION_KEY_SLOT).unwrap().unwrap(), key);

        f.store.end_session().unwrap();
        assert!(f.session.is_empty());
        assert_eq!(f.store.get_secure_item::<String>("a").unwrap(), None);
        assert_eq!(f.local.get(ENCRYPTION_KEY_SLOT).unwrap().unwrap(), key);
    }

    #[test]
    fn missing_key_reads_as_absent() {
        let f = fixture();
        f.store.set_secure_item("a", "1").unwrap();
        f.local.remove(ENCRYPTION_KEY_SLOT).unwrap();
        assert_eq!(f.store.get_secure_item::<String>("a").unwrap(), None);
        assert_eq!(f.session.get("a").unwrap(), None);
    }

    #[test]
    fn moved_or_tampered_items_fail_to_open() {
        let f = fixture();
        f.store.set_secure_item("auth_token", "abc").unwrap();

        let raw = f.session.get("auth_token").unwrap().unwrap();
        f.session.set("session_token", raw.clone()).unwrap();
        assert!(matches!(
            f.store.get_secure_item::<String>("session_token"),
            Err(StoreError::Decrypt)
        ));

        let mut item: SealedItem = serde_json::from_slice(&raw).unwrap();
        let mut data = base64::engine::general_purpose::STANDARD.decode(&item.data).unwrap();
        let last = data.len() - 1;
        data[last] ^= 0x01;
        item.data = base64::engine::general_purpose::STANDARD.encode(data);
        f.session.set("auth_token", serde_json::to_vec(&item).unwrap()).unwrap();
        assert!(matches!(f.store.get_secure_item::<String>("auth_token"), Err(StoreError::Decrypt)));
        assert_eq!(f.session.get("auth_token").unwrap(), None);
    }
}
