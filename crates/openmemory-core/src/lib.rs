//! # openmemory-core
//!
//! Foundation crate for the OpenMemory engine.
//! Defines the sector model, memory/vector/graph types, the error taxonomy,
//! and the environment-derived configuration.
//! Every other crate in the workspace depends on this.

pub mod config;
pub mod errors;
pub mod hash;
pub mod models;
pub mod sector;

// Re-export the most commonly used types at the crate root.
pub use config::{ConfigHandle, OmConfig};
pub use errors::{OmError, OmResult};
pub use models::{
    ApiKeyRecord, AuditRecord, MemoryItem, QueryHit, QueryRequest, TemporalEdge, TemporalFact,
    VectorRecord, Waypoint,
};
pub use sector::Sector;
