//! Prog-metal Catalog Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod catalog_store;
pub mod config;
pub mod enrichment;
pub mod importer;
pub mod server;
pub mod sheets;
pub mod sync;

// Re-export commonly used types for convenience
pub use catalog_store::{Album, CatalogStore, SqliteCatalogStore};
pub use server::{run_server, ServerState};
pub use sync::{SqliteSyncStore, SyncManager, SyncSettings, SyncStore, TriggerOutcome};
