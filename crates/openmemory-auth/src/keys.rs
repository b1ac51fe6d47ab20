//! API key lifecycle: generation, hashing, verification.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use rand::Rng;
use subtle::ConstantTimeEq;

use openmemory_core::models::ApiKeyRecord;
use openmemory_core::{OmError, OmResult};
use openmemory_storage::MemoryStore;

/// Generate a fresh plaintext key. Shown once at creation; only the hash is
/// stored.
pub fn generate_key() -> String {
    let mut rng = rand::thread_rng();
    let raw: [u8; 24] = rng.gen();
    let hex: String = raw.iter().map(|b| format!("{b:02x}")).collect();
    format!("om_{hex}")
}

/// Argon2id hash of a plaintext key.
pub fn hash_key(plaintext: &str) -> OmResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| OmError::internal(format!("hash key: {e}")))
}

/// Verify a plaintext key against a stored hash. Argon2 verification is
/// constant-time once the hash is computed.
pub fn verify_hash(plaintext: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Constant-time comparison for the static single-key deployments where the
/// configured key is not hashed.
pub fn static_key_matches(presented: &str, configured: &str) -> bool {
    presented.as_bytes().ct_eq(configured.as_bytes()).into()
}

/// Key verification against the stored per-user keys.
pub struct KeyManager<'a> {
    store: &'a MemoryStore,
}

impl<'a> KeyManager<'a> {
    pub fn new(store: &'a MemoryStore) -> Self {
        Self { store }
    }

    /// Mint a key for a user, persist its hash, and return the plaintext
    /// exactly once.
    pub async fn create(&self, user_id: &str, scopes: &[&str]) -> OmResult<String> {
        let plaintext = generate_key();
        let record = ApiKeyRecord {
            hash: hash_key(&plaintext)?,
            user_id: user_id.to_string(),
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
            created_at: chrono::Utc::now(),
            last_used_at: None,
            disabled: false,
        };
        self.store.insert_api_key(&record).await?;
        Ok(plaintext)
    }

    /// Resolve a presented key to its record, touching last_used_at. The
    /// working set of enabled keys is hashed against one by one; a miss
    /// costs the same hashing work as a hit.
    pub async fn verify(&self, presented: &str) -> OmResult<Option<ApiKeyRecord>> {
        let candidates = self.store.list_enabled_api_keys().await?;
        for record in candidates {
            if verify_hash(presented, &record.hash) {
                self.store.touch_api_key(&record.hash).await?;
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    pub async fn disable(&self, hash: &str) -> OmResult<()> {
        self.store.disable_api_key(hash).await
    }

    pub async fn list_for_user(&self, user_id: &str) -> OmResult<Vec<ApiKeyRecord>> {
        self.store.list_api_keys(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_verifies_and_rejects() {
        let key = generate_key();
        let hash = hash_key(&key).unwrap();
        assert!(verify_hash(&key, &hash));
        assert!(!verify_hash("om_wrong", &hash));
    }

    #[test]
    fn generated_keys_are_unique_and_prefixed() {
        let a = generate_key();
        let b = generate_key();
        assert_ne!(a, b);
        assert!(a.starts_with("om_"));
        assert_eq!(a.len(), 3 + 48);
    }

    #[test]
    fn static_comparison_handles_length_mismatch() {
        assert!(static_key_matches("abc", "abc"));
        assert!(!static_key_matches("abc", "abcd"));
        assert!(!static_key_matches("", "abc"));
    }

    #[test]
    fn garbage_hash_never_verifies() {
        assert!(!verify_hash("om_key", "not-a-phc-string"));
    }
}
