//! Versioned key registry.
//!
//! Read-mostly: lookups on every row encrypt/decrypt, mutation only from the
//! key-rotation job under its singleton guard.

use std::collections::BTreeMap;

use base64::Engine as _;
use parking_lot::RwLock;
use rand::RngCore;

use openmemory_core::{OmError, OmResult};

/// Maps key version -> 32-byte AES-256 key material.
pub struct KeyRegistry {
    keys: RwLock<BTreeMap<u32, [u8; 32]>>,
    current: RwLock<u32>,
}

impl KeyRegistry {
    /// Build a registry holding a single key at the given version.
    pub fn new(version: u32, key: [u8; 32]) -> Self {
        let mut keys = BTreeMap::new();
        keys.insert(version, key);
        Self {
            keys: RwLock::new(keys),
            current: RwLock::new(version),
        }
    }

    /// Decode base64 key material from configuration, or generate an
    /// ephemeral key when none is configured (contents survive only as long
    /// as the process in that case).
    pub fn from_config(material: Option<&str>, version: u32) -> OmResult<Self> {
        let key = match material {
            Some(b64) => {
                let raw = base64::engine::general_purpose::STANDARD
                    .decode(b64)
                    .map_err(|e| OmError::validation(format!("ENCRYPTION_KEY: {e}")))?;
                let key: [u8; 32] = raw.try_into().map_err(|_| {
                    OmError::validation("ENCRYPTION_KEY must decode to exactly 32 bytes")
                })?;
                key
            }
            None => {
                let mut key = [0u8; 32];
                rand::thread_rng().fill_bytes(&mut key);
                key
            }
        };
        Ok(Self::new(version, key))
    }

    /// Key for a specific version, if registered.
    pub fn get(&self, version: u32) -> Option<[u8; 32]> {
        self.keys.read().get(&version).copied()
    }

    /// The version new writes are encrypted with.
    pub fn current_version(&self) -> u32 {
        *self.current.read()
    }

    /// Register a new key and make it current. Older keys stay available
    /// for decryption until rotation rewrites every row.
    pub fn install(&self, version: u32, key: [u8; 32]) -> OmResult<()> {
        let mut keys = self.keys.write();
        if keys.contains_key(&version) {
            return Err(OmError::conflict(format!(
                "encryption key version {version} already registered"
            )));
        }
        keys.insert(version, key);
        *self.current.write() = version;
        Ok(())
    }

    /// Versions currently registered, ascending.
    pub fn versions(&self) -> Vec<u32> {
        self.keys.read().keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_advances_current_version() {
        let reg = KeyRegistry::new(1, [7u8; 32]);
        assert_eq!(reg.current_version(), 1);
        reg.install(2, [9u8; 32]).unwrap();
        assert_eq!(reg.current_version(), 2);
        assert!(reg.get(1).is_some());
        assert!(reg.get(2).is_some());
    }

    #[test]
    fn duplicate_version_is_a_conflict() {
        let reg = KeyRegistry::new(1, [7u8; 32]);
        assert!(reg.install(1, [9u8; 32]).is_err());
    }

    #[test]
    fn bad_base64_is_rejected() {
        assert!(KeyRegistry::from_config(Some("not-base64!!"), 1).is_err());
    }
}
