//! AES-256-GCM content cipher.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine as _;
use rand::RngCore;

use openmemory_core::{OmError, OmResult};

use crate::registry::KeyRegistry;

const NONCE_LEN: usize = 12;

/// Encrypts and decrypts memory content against the key registry.
pub struct ContentCipher {
    registry: std::sync::Arc<KeyRegistry>,
}

impl ContentCipher {
    pub fn new(registry: std::sync::Arc<KeyRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &KeyRegistry {
        &self.registry
    }

    /// Encrypt plaintext with the current key. Returns (ciphertext_b64,
    /// key_version). A fresh random nonce is prepended to the ciphertext.
    pub fn encrypt(&self, plaintext: &str) -> OmResult<(String, u32)> {
        let version = self.registry.current_version();
        let ct = self.encrypt_with(plaintext, version)?;
        Ok((ct, version))
    }

    /// Encrypt with a specific key version (used by rotation).
    pub fn encrypt_with(&self, plaintext: &str, version: u32) -> OmResult<String> {
        let key = self.key_for(version)?;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));

        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ct = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|_| OmError::internal("content encryption failed"))?;

        let mut framed = Vec::with_capacity(NONCE_LEN + ct.len());
        framed.extend_from_slice(&nonce);
        framed.extend_from_slice(&ct);
        Ok(base64::engine::general_purpose::STANDARD.encode(framed))
    }

    /// Decrypt base64 ciphertext written with the given key version.
    pub fn decrypt(&self, ciphertext_b64: &str, version: u32) -> OmResult<String> {
        let key = self.key_for(version)?;
        let framed = base64::engine::general_purpose::STANDARD
            .decode(ciphertext_b64)
            .map_err(|_| OmError::internal("malformed ciphertext encoding"))?;
        if framed.len() < NONCE_LEN {
            return Err(OmError::internal("ciphertext shorter than nonce"));
        }
        let (nonce, ct) = framed.split_at(NONCE_LEN);

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce), ct)
            .map_err(|_| OmError::internal("content authentication failed"))?;
        String::from_utf8(plaintext).map_err(|_| OmError::internal("decrypted content not UTF-8"))
    }

    fn key_for(&self, version: u32) -> OmResult<[u8; 32]> {
        self.registry.get(version).ok_or_else(|| {
            OmError::internal(format!("no key registered for version {version}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn cipher() -> ContentCipher {
        ContentCipher::new(Arc::new(KeyRegistry::new(1, [42u8; 32])))
    }

    #[test]
    fn round_trip() {
        let c = cipher();
        let (ct, version) = c.encrypt("I went to Paris yesterday").unwrap();
        assert_eq!(version, 1);
        assert_eq!(c.decrypt(&ct, version).unwrap(), "I went to Paris yesterday");
    }

    #[test]
    fn nonces_differ_per_encryption() {
        let c = cipher();
        let (a, _) = c.encrypt("same text").unwrap();
        let (b, _) = c.encrypt("same text").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn tampered_ciphertext_fails_authentication() {
        let c = cipher();
        let (ct, version) = c.encrypt("secret").unwrap();
        let mut raw = base64::engine::general_purpose::STANDARD.decode(&ct).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0xff;
        let tampered = base64::engine::general_purpose::STANDARD.encode(raw);
        assert!(c.decrypt(&tampered, version).is_err());
    }

    #[test]
    fn rotation_decrypts_old_and_new() {
        let reg = Arc::new(KeyRegistry::new(1, [1u8; 32]));
        let c = ContentCipher::new(reg.clone());
        let (old_ct, old_v) = c.encrypt("before rotation").unwrap();

        reg.install(2, [2u8; 32]).unwrap();
        let (new_ct, new_v) = c.encrypt("after rotation").unwrap();

        assert_eq!(old_v, 1);
        assert_eq!(new_v, 2);
        assert_eq!(c.decrypt(&old_ct, 1).unwrap(), "before rotation");
        assert_eq!(c.decrypt(&new_ct, 2).unwrap(), "after rotation");
    }
}
