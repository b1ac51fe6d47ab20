//! # openmemory-auth
//!
//! API keys (argon2id at rest, constant-time verification), scope matching,
//! and the fixed-window rate limiter backed by the storage layer.

pub mod keys;
pub mod rate;
pub mod scopes;

pub use keys::{generate_key, hash_key, verify_hash, KeyManager};
pub use rate::RateLimiter;
pub use scopes::scope_allows;
