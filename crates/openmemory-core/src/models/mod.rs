//! Data model types persisted by the storage layer.

mod audit;
mod key;
mod memory;
mod query;
mod temporal;
mod vector;
mod waypoint;

pub use audit::AuditRecord;
pub use key::ApiKeyRecord;
pub use memory::MemoryItem;
pub use query::{QueryHit, QueryMode, QueryRequest};
pub use temporal::{FactQuery, TemporalEdge, TemporalFact};
pub use vector::VectorRecord;
pub use waypoint::Waypoint;
