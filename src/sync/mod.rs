//! Catalog synchronization: orchestration, concurrency guard, progress
//! tracking, and run history.

mod error;
mod manager;
mod models;
mod schema;
mod store;

pub use error::SyncError;
pub use manager::{SyncManager, SyncSettings, TriggerOutcome};
pub use models::{SyncOperation, SyncRecord, SyncStage, SyncStatus, SyncTotals, TabFailure};
pub use schema::SYNC_SCHEMA_SQL;
pub use store::{AcquireOutcome, SqliteSyncStore, SyncStore};
