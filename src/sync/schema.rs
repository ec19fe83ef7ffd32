//! Database schema for sync tracking.
//!
//! Two tables with different lifetimes:
//! - sync_operations: drives live progress display, one active row at most
//! - sync_records: permanent per-run history

/// SQL schema for the sync database.
pub const SYNC_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS sync_operations (
    id TEXT PRIMARY KEY,
    status TEXT NOT NULL,
    stage TEXT,
    stage_message TEXT NOT NULL DEFAULT '',
    current_tab TEXT NOT NULL DEFAULT '',
    albums_processed INTEGER NOT NULL DEFAULT 0,
    total_albums INTEGER,
    error_message TEXT,

    -- Timestamps (Unix milliseconds)
    started_at INTEGER NOT NULL,
    completed_at INTEGER
);

CREATE TABLE IF NOT EXISTS sync_records (
    id TEXT PRIMARY KEY,
    sync_timestamp INTEGER NOT NULL,
    albums_created INTEGER NOT NULL DEFAULT 0,
    albums_updated INTEGER NOT NULL DEFAULT 0,
    albums_skipped INTEGER NOT NULL DEFAULT 0,
    albums_failed INTEGER NOT NULL DEFAULT 0,
    total_albums_in_catalog INTEGER NOT NULL DEFAULT 0,
    success INTEGER NOT NULL,
    error_message TEXT
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_sync_operations_status ON sync_operations(status);
CREATE INDEX IF NOT EXISTS idx_sync_records_timestamp ON sync_records(sync_timestamp DESC);
"#;
