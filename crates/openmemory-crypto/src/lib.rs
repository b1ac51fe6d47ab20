//! # openmemory-crypto
//!
//! AES-256-GCM encryption of memory content with key-version tracking.
//! Ciphertext layout is `nonce(12) || ct`, base64-encoded for storage.

mod cipher;
mod registry;

pub use cipher::ContentCipher;
pub use registry::KeyRegistry;
