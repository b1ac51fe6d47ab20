//! # openmemory-storage
//!
//! Dual-backend persistence: an embedded single-file store (WAL, one writer,
//! read pool) and a remote relational server (pooled, prefixed tables) behind
//! one named-operation surface. Also home of the placeholder-aware SQL
//! rewriter, the strict-tenant guard, versioned migrations, and online
//! backups.

pub mod backup;
pub mod embedded;
pub mod migrations;
pub mod remote;
pub mod sql;
pub mod store;
pub mod tenant;

pub use backup::BackupInfo;
pub use store::{Backend, DashboardStats, MemoryStore, StoreTx};
pub use tenant::TenantGuard;
