//! SQLite store for sync operations and history.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use super::models::{SyncOperation, SyncRecord, SyncStage, SyncStatus};
use super::schema::SYNC_SCHEMA_SQL;

/// Result of an acquisition attempt.
#[derive(Debug)]
pub enum AcquireOutcome {
    /// A fresh pending operation now owns the sync slot.
    Acquired(SyncOperation),
    /// Another operation is pending or running.
    AlreadyRunning,
}

/// Trait for sync storage operations.
pub trait SyncStore: Send + Sync {
    /// Atomically check for an active operation and, if none exists, create
    /// a new pending one. The check and the insert happen in one write
    /// transaction so concurrent callers cannot both acquire.
    fn try_acquire(&self) -> Result<AcquireOutcome>;

    /// Get an operation by ID.
    fn get_operation(&self, id: &str) -> Result<Option<SyncOperation>>;

    /// The single pending/running operation, if any.
    fn current_active_operation(&self) -> Result<Option<SyncOperation>>;

    /// Transition a pending operation to running, entering the fetch stage.
    fn mark_running(&self, id: &str, stage_message: &str) -> Result<()>;

    /// Record entry into a tab: processing stage, counter reset to zero,
    /// row total unknown until the tab is read.
    fn enter_tab(&self, id: &str, tab_name: &str, stage_message: &str) -> Result<()>;

    /// Record the current tab's row count once known.
    fn set_tab_total(&self, id: &str, total_albums: i64, stage_message: &str) -> Result<()>;

    /// Update the per-tab progress counter. Minimal-field write.
    fn update_progress(&self, id: &str, albums_processed: i64, stage_message: &str) -> Result<()>;

    /// Enter the finalizing stage and clear the current tab.
    fn begin_finalizing(&self, id: &str, stage_message: &str) -> Result<()>;

    /// Move an operation to a terminal status. Fails if the operation is
    /// already terminal; terminal rows are immutable.
    fn finalize(
        &self,
        id: &str,
        status: SyncStatus,
        stage_message: &str,
        error_message: Option<&str>,
    ) -> Result<()>;

    /// Mark active operations older than the threshold as failed, so a
    /// crashed worker cannot block syncing forever. Returns how many rows
    /// were reclaimed.
    fn reclaim_stale(&self, threshold_secs: u64) -> Result<usize>;

    /// Append a history record.
    fn create_record(&self, record: &SyncRecord) -> Result<()>;

    /// Most recent successful history record.
    fn last_successful_sync(&self) -> Result<Option<SyncRecord>>;

    /// History records, newest first.
    fn list_records(&self, limit: usize) -> Result<Vec<SyncRecord>>;
}

/// SQLite implementation of SyncStore.
pub struct SqliteSyncStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSyncStore {
    /// Open or create a sync database.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open sync database: {:?}", path))?;
        Self::init(conn)
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        // Fail fast instead of queueing when another writer holds the lock;
        // try_acquire turns that into an "already running" signal.
        conn.busy_timeout(Duration::from_millis(0))?;
        conn.execute_batch(SYNC_SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn row_to_operation(row: &rusqlite::Row) -> rusqlite::Result<SyncOperation> {
        Ok(SyncOperation {
            id: row.get("id")?,
            status: SyncStatus::parse(&row.get::<_, String>("status")?)
                .unwrap_or(SyncStatus::Failed),
            stage: row
                .get::<_, Option<String>>("stage")?
                .and_then(|s| SyncStage::parse(&s)),
            stage_message: row.get("stage_message")?,
            current_tab: row.get("current_tab")?,
            albums_processed: row.get("albums_processed")?,
            total_albums: row.get("total_albums")?,
            error_message: row.get("error_message")?,
            started_at: row.get("started_at")?,
            completed_at: row.get("completed_at")?,
        })
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<SyncRecord> {
        Ok(SyncRecord {
            id: row.get("id")?,
            sync_timestamp: row.get("sync_timestamp")?,
            albums_created: row.get("albums_created")?,
            albums_updated: row.get("albums_updated")?,
            albums_skipped: row.get("albums_skipped")?,
            albums_failed: row.get("albums_failed")?,
            total_albums_in_catalog: row.get("total_albums_in_catalog")?,
            success: row.get::<_, i32>("success")? != 0,
            error_message: row.get("error_message")?,
        })
    }
}

impl SyncStore for SqliteSyncStore {
    fn try_acquire(&self) -> Result<AcquireOutcome> {
        let mut conn = self.conn.lock().unwrap();

        let tx = match conn.transaction_with_behavior(TransactionBehavior::Immediate) {
            Ok(tx) => tx,
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::DatabaseBusy =>
            {
                // Another connection holds the write lock; by construction
                // that writer is the competing try_acquire.
                return Ok(AcquireOutcome::AlreadyRunning);
            }
            Err(e) => return Err(e.into()),
        };

        let active: i64 = tx.query_row(
            "SELECT COUNT(*) FROM sync_operations WHERE status IN ('pending', 'running')",
            [],
            |row| row.get(0),
        )?;
        if active > 0 {
            return Ok(AcquireOutcome::AlreadyRunning);
        }

        let operation = SyncOperation {
            id: uuid::Uuid::new_v4().to_string(),
            status: SyncStatus::Pending,
            stage: None,
            stage_message: "Sync queued".to_string(),
            current_tab: String::new(),
            albums_processed: 0,
            total_albums: None,
            error_message: None,
            started_at: chrono::Utc::now().timestamp_millis(),
            completed_at: None,
        };

        tx.execute(
            r#"
            INSERT INTO sync_operations (
                id, status, stage, stage_message, current_tab,
                albums_processed, total_albums, error_message,
                started_at, completed_at
            ) VALUES (?1, ?2, NULL, ?3, '', 0, NULL, NULL, ?4, NULL)
            "#,
            params![
                operation.id,
                operation.status.as_str(),
                operation.stage_message,
                operation.started_at,
            ],
        )?;
        tx.commit()?;

        Ok(AcquireOutcome::Acquired(operation))
    }

    fn get_operation(&self, id: &str) -> Result<Option<SyncOperation>> {
        let conn = self.conn.lock().unwrap();
        let result = conn
            .query_row(
                "SELECT * FROM sync_operations WHERE id = ?1",
                params![id],
                Self::row_to_operation,
            )
            .optional()?;
        Ok(result)
    }

    fn current_active_operation(&self) -> Result<Option<SyncOperation>> {
        let conn = self.conn.lock().unwrap();
        let result = conn
            .query_row(
                r#"
                SELECT * FROM sync_operations
                WHERE status IN ('pending', 'running')
                ORDER BY started_at DESC
                LIMIT 1
                "#,
                [],
                Self::row_to_operation,
            )
            .optional()?;
        Ok(result)
    }

    fn mark_running(&self, id: &str, stage_message: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            UPDATE sync_operations
            SET status = 'running', stage = 'fetching', stage_message = ?2
            WHERE id = ?1
            "#,
            params![id, stage_message],
        )?;
        Ok(())
    }

    fn enter_tab(&self, id: &str, tab_name: &str, stage_message: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            UPDATE sync_operations
            SET stage = 'processing', current_tab = ?2,
                albums_processed = 0, total_albums = NULL, stage_message = ?3
            WHERE id = ?1
            "#,
            params![id, tab_name, stage_message],
        )?;
        Ok(())
    }

    fn set_tab_total(&self, id: &str, total_albums: i64, stage_message: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE sync_operations SET total_albums = ?2, stage_message = ?3 WHERE id = ?1",
            params![id, total_albums, stage_message],
        )?;
        Ok(())
    }

    fn update_progress(&self, id: &str, albums_processed: i64, stage_message: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE sync_operations SET albums_processed = ?2, stage_message = ?3 WHERE id = ?1",
            params![id, albums_processed, stage_message],
        )?;
        Ok(())
    }

    fn begin_finalizing(&self, id: &str, stage_message: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            UPDATE sync_operations
            SET stage = 'finalizing', current_tab = '', stage_message = ?2
            WHERE id = ?1
            "#,
            params![id, stage_message],
        )?;
        Ok(())
    }

    fn finalize(
        &self,
        id: &str,
        status: SyncStatus,
        stage_message: &str,
        error_message: Option<&str>,
    ) -> Result<()> {
        if !status.is_terminal() {
            anyhow::bail!("finalize requires a terminal status, got {:?}", status);
        }
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute(
            r#"
            UPDATE sync_operations
            SET status = ?2, stage_message = ?3, error_message = ?4, completed_at = ?5
            WHERE id = ?1 AND status IN ('pending', 'running')
            "#,
            params![
                id,
                status.as_str(),
                stage_message,
                error_message,
                chrono::Utc::now().timestamp_millis(),
            ],
        )?;
        if affected == 0 {
            anyhow::bail!("sync operation {} is missing or already terminal", id);
        }
        Ok(())
    }

    fn reclaim_stale(&self, threshold_secs: u64) -> Result<usize> {
        let now = chrono::Utc::now().timestamp_millis();
        let cutoff = now - (threshold_secs as i64) * 1000;
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute(
            r#"
            UPDATE sync_operations
            SET status = 'failed',
                error_message = 'Reclaimed: operation exceeded the staleness threshold',
                completed_at = ?2
            WHERE status IN ('pending', 'running') AND started_at < ?1
            "#,
            params![cutoff, now],
        )?;
        Ok(affected)
    }

    fn create_record(&self, record: &SyncRecord) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO sync_records (
                id, sync_timestamp, albums_created, albums_updated,
                albums_skipped, albums_failed, total_albums_in_catalog,
                success, error_message
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                record.id,
                record.sync_timestamp,
                record.albums_created,
                record.albums_updated,
                record.albums_skipped,
                record.albums_failed,
                record.total_albums_in_catalog,
                record.success as i32,
                record.error_message,
            ],
        )?;
        Ok(())
    }

    fn last_successful_sync(&self) -> Result<Option<SyncRecord>> {
        let conn = self.conn.lock().unwrap();
        let result = conn
            .query_row(
                r#"
                SELECT * FROM sync_records
                WHERE success = 1
                ORDER BY sync_timestamp DESC
                LIMIT 1
                "#,
                [],
                Self::row_to_record,
            )
            .optional()?;
        Ok(result)
    }

    fn list_records(&self, limit: usize) -> Result<Vec<SyncRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT * FROM sync_records ORDER BY sync_timestamp DESC, rowid DESC LIMIT ?1")?;
        let records = stmt
            .query_map(params![limit as i64], Self::row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }
}
