//! # openmemory-embeddings
//!
//! Uniform `embed(text) -> vector` over tagged provider variants:
//! deterministic synthetic, local daemon, hosted API, and a sector-routing
//! meta-provider with a scored micro-cache in front.

pub mod cache;
pub mod daemon;
pub mod micro_cache;
pub mod provider;
pub mod remote_api;
pub mod router;
pub mod synthetic;

pub use micro_cache::MicroCache;
pub use provider::{Embedder, ProviderHealth};
pub use router::EmbedOutput;
