//! Sync orchestrator.
//!
//! Drives one complete synchronization attempt from trigger to
//! finalization: tab enumeration and ordering, per-tab and per-album
//! processing with contained failures, throttled progress writes, and the
//! closing history record.

use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info, warn};

use crate::catalog_store::CatalogStore;
use crate::enrichment::{extract_album_id, EnrichmentClient};
use crate::importer::{AlbumImporter, RowOutcome};
use crate::sheets::{
    enumerate_tabs, sort_chronologically, AlbumRow, DocumentSource, TabMetadata,
};
use crate::sync::error::SyncError;
use crate::sync::models::{SyncRecord, SyncStatus, SyncTotals, TabFailure};
use crate::sync::store::{AcquireOutcome, SyncStore};

/// Tab failure reasons are cut to this length in the run summary.
const FAILURE_REASON_MAX_LEN: usize = 50;

/// Orchestrator tunables.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Progress is written every this many albums within a tab, plus
    /// unconditionally on tab entry and on the tab's last album.
    pub progress_update_every: usize,
    /// Active operations older than this are reclaimed before acquisition.
    pub stale_operation_threshold_secs: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            progress_update_every: 5,
            stale_operation_threshold_secs: 3600,
        }
    }
}

/// Immediate answer to a trigger request.
#[derive(Debug)]
pub enum TriggerOutcome {
    /// A new operation was created; the sync runs in the background.
    Accepted { operation_id: String },
    /// A sync is already pending or running.
    AlreadyRunning,
    /// Required settings are missing; no operation was created.
    ConfigError(String),
}

pub struct SyncManager {
    sync_store: Arc<dyn SyncStore>,
    catalog: Arc<dyn CatalogStore>,
    source: Arc<dyn DocumentSource>,
    enrichment: Arc<dyn EnrichmentClient>,
    importer: AlbumImporter,
    settings: SyncSettings,
    config_error: Option<String>,
}

impl SyncManager {
    pub fn new(
        sync_store: Arc<dyn SyncStore>,
        catalog: Arc<dyn CatalogStore>,
        source: Arc<dyn DocumentSource>,
        enrichment: Arc<dyn EnrichmentClient>,
        settings: SyncSettings,
        config_error: Option<String>,
    ) -> Self {
        let importer = AlbumImporter::new(catalog.clone());
        Self {
            sync_store,
            catalog,
            source,
            enrichment,
            importer,
            settings,
            config_error,
        }
    }

    /// Try to start a sync. Returns immediately; the run itself executes
    /// on a background task and communicates only through the stored
    /// operation row.
    pub fn trigger(self: &Arc<Self>) -> Result<TriggerOutcome> {
        if let Some(msg) = &self.config_error {
            warn!("Sync trigger rejected: {}", msg);
            return Ok(TriggerOutcome::ConfigError(msg.clone()));
        }

        let reclaimed = self
            .sync_store
            .reclaim_stale(self.settings.stale_operation_threshold_secs)?;
        if reclaimed > 0 {
            warn!("Reclaimed {} stale sync operation(s)", reclaimed);
        }

        let operation = match self.sync_store.try_acquire()? {
            AcquireOutcome::Acquired(op) => op,
            AcquireOutcome::AlreadyRunning => return Ok(TriggerOutcome::AlreadyRunning),
        };

        let operation_id = operation.id.clone();
        let manager = self.clone();
        let run_id = operation_id.clone();
        tokio::spawn(async move {
            manager.run_sync(&run_id).await;
        });

        info!("Accepted sync trigger, operation {}", operation_id);
        Ok(TriggerOutcome::Accepted { operation_id })
    }

    /// Execute one sync run to completion. Never panics the task; every
    /// failure path ends in a terminal operation state plus a history
    /// record.
    pub async fn run_sync(&self, operation_id: &str) {
        if let Err(e) = self.run_sync_inner(operation_id).await {
            error!("Sync {} aborted on a storage error: {:#}", operation_id, e);
        }
    }

    async fn run_sync_inner(&self, id: &str) -> Result<()> {
        info!("Starting sync operation {}", id);
        self.sync_store
            .mark_running(id, "Fetching spreadsheet tabs...")?;

        let document = match self.source.load_document().await {
            Ok(doc) => doc,
            Err(e) => {
                warn!("Sync {}: spreadsheet load failed: {:#}", id, e);
                return self.fail_run(id, &format!("Unable to load the spreadsheet source: {:#}", e));
            }
        };

        let tabs: Vec<TabMetadata> = enumerate_tabs(document.as_ref())
            .into_iter()
            .filter(|t| t.is_included)
            .collect();
        let tabs = sort_chronologically(tabs);
        let tab_count = tabs.len();
        info!("Sync {}: {} relevant tab(s)", id, tab_count);

        let mut totals = SyncTotals::default();
        let mut tab_failures: Vec<TabFailure> = Vec::new();

        // The modulus below must never see a zero divisor; an interval of
        // zero means a write on every album.
        let update_every = self.settings.progress_update_every.max(1);

        for (idx, tab) in tabs.iter().enumerate() {
            let tab_index = idx + 1;
            self.sync_store.enter_tab(
                id,
                &tab.name,
                &format!("Tab {}/{}: {} - reading rows", tab_index, tab_count, tab.name),
            )?;

            let rows = match document.fetch_rows(&tab.name) {
                Ok(rows) => rows,
                Err(e) => match SyncError::from_sheet_error(&tab.name, e) {
                    SyncError::Critical(msg) => {
                        warn!("Sync {}: critical failure in tab '{}': {}", id, tab.name, msg);
                        return self.fail_run(id, &msg);
                    }
                    tab_error => {
                        warn!("Sync {}: {}", id, tab_error);
                        tab_failures.push(TabFailure {
                            tab: tab.name.clone(),
                            reason: tab_error.to_string(),
                        });
                        continue;
                    }
                },
            };

            let in_tab_total = rows.len();
            self.sync_store.set_tab_total(
                id,
                in_tab_total as i64,
                &format!(
                    "Tab {}/{}: {} - album 0/{}",
                    tab_index, tab_count, tab.name, in_tab_total
                ),
            )?;

            for (row_idx, row) in rows.iter().enumerate() {
                let processed = row_idx + 1;

                match self.process_row(row).await {
                    Ok(RowOutcome::Created) => totals.created += 1,
                    Ok(RowOutcome::Updated) => totals.updated += 1,
                    Ok(RowOutcome::Skipped) => totals.skipped += 1,
                    Err(e) => {
                        warn!("Sync {}: {}", id, e);
                        totals.failed += 1;
                    }
                }

                if processed % update_every == 0 || processed == in_tab_total {
                    self.sync_store.update_progress(
                        id,
                        processed as i64,
                        &format!(
                            "Tab {}/{}: {} - album {}/{}",
                            tab_index, tab_count, tab.name, processed, in_tab_total
                        ),
                    )?;
                }
            }
        }

        self.sync_store
            .begin_finalizing(id, "Finalizing synchronization...")?;

        let success = tab_failures.is_empty() && totals.failed == 0;
        let error_message = summarize_failures(&tab_failures, &totals);

        self.write_record(&totals, success, error_message.as_deref())?;

        let stage_message = if tab_count == 0 {
            "Sync complete. No release tabs found.".to_string()
        } else if success {
            format!(
                "Sync complete! {} created, {} updated, {} skipped",
                totals.created, totals.updated, totals.skipped
            )
        } else {
            "Sync completed with warnings".to_string()
        };

        self.sync_store.finalize(
            id,
            SyncStatus::Completed,
            &stage_message,
            error_message.as_deref(),
        )?;

        info!(
            "Sync {} completed: {} row(s) processed ({} created, {} updated, {} skipped, {} failed), {} tab(s) failed",
            id,
            totals.processed(),
            totals.created,
            totals.updated,
            totals.skipped,
            totals.failed,
            tab_failures.len()
        );
        Ok(())
    }

    /// Process one row: resolve the album ID, look up metadata, import.
    async fn process_row(&self, row: &AlbumRow) -> Result<RowOutcome, SyncError> {
        let album_id = extract_album_id(&row.spotify_url).ok_or_else(|| SyncError::Album {
            album: row.album.clone(),
            reason: format!("no album ID in URL {:?}", row.spotify_url),
        })?;

        let metadata = self
            .enrichment
            .album_metadata(&album_id)
            .await
            .map_err(|e| SyncError::Album {
                album: row.album.clone(),
                reason: e.to_string(),
            })?;

        self.importer
            .import_row(row, &metadata)
            .map_err(|e| SyncError::Album {
                album: row.album.clone(),
                reason: format!("{:#}", e),
            })
    }

    /// Terminal path for critical errors: failed status plus a failed
    /// history record. Partial catalog writes made before the error stay.
    fn fail_run(&self, id: &str, message: &str) -> Result<()> {
        self.write_record(&SyncTotals::default(), false, Some(message))?;
        self.sync_store
            .finalize(id, SyncStatus::Failed, "Sync failed", Some(message))?;
        Ok(())
    }

    fn write_record(
        &self,
        totals: &SyncTotals,
        success: bool,
        error_message: Option<&str>,
    ) -> Result<()> {
        self.sync_store.create_record(&SyncRecord {
            id: uuid::Uuid::new_v4().to_string(),
            sync_timestamp: chrono::Utc::now().timestamp_millis(),
            albums_created: totals.created,
            albums_updated: totals.updated,
            albums_skipped: totals.skipped,
            albums_failed: totals.failed,
            total_albums_in_catalog: self.catalog.album_count()?,
            success,
            error_message: error_message.map(|s| s.to_string()),
        })
    }
}

/// Build the human-readable partial-failure summary, or none on a clean run.
fn summarize_failures(tab_failures: &[TabFailure], totals: &SyncTotals) -> Option<String> {
    let mut parts = Vec::new();

    if !tab_failures.is_empty() {
        let tabs = tab_failures
            .iter()
            .map(|f| format!("{}: {}", f.tab, truncate(&f.reason, FAILURE_REASON_MAX_LEN)))
            .collect::<Vec<_>>()
            .join(", ");
        parts.push(format!("{} tab(s) failed: {}", tab_failures.len(), tabs));
    }
    if totals.failed > 0 {
        parts.push(format!("{} album(s) failed", totals.failed));
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("; "))
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        s.chars().take(max_len).collect()
    }
}
