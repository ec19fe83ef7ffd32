//! Sync operation and history models.

use serde::Serialize;

/// Lifecycle of one sync attempt.
///
/// `Pending` and `Running` are the only non-terminal states; an operation
/// that reaches `Completed` or `Failed` never changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Running => "running",
            SyncStatus::Completed => "completed",
            SyncStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(SyncStatus::Pending),
            "running" => Some(SyncStatus::Running),
            "completed" => Some(SyncStatus::Completed),
            "failed" => Some(SyncStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncStatus::Completed | SyncStatus::Failed)
    }
}

/// Phase within a running operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStage {
    Fetching,
    Processing,
    Finalizing,
}

impl SyncStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStage::Fetching => "fetching",
            SyncStage::Processing => "processing",
            SyncStage::Finalizing => "finalizing",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "fetching" => Some(SyncStage::Fetching),
            "processing" => Some(SyncStage::Processing),
            "finalizing" => Some(SyncStage::Finalizing),
            _ => None,
        }
    }
}

/// One in-flight or just-finished synchronization attempt.
///
/// This row is the single channel between the background worker and any
/// number of concurrent pollers. At most one row is ever in a non-terminal
/// status, enforced at acquisition time.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOperation {
    pub id: String,
    pub status: SyncStatus,
    pub stage: Option<SyncStage>,
    pub stage_message: String,
    /// Name of the tab presently processed, empty when idle.
    pub current_tab: String,
    /// Albums processed within the current tab. Reset to 0 on tab entry.
    pub albums_processed: i64,
    /// Row count of the current tab, known only once its rows are read.
    pub total_albums: Option<i64>,
    pub error_message: Option<String>,
    /// Unix milliseconds.
    pub started_at: i64,
    /// Unix milliseconds, set only at a terminal state.
    pub completed_at: Option<i64>,
}

impl SyncOperation {
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Percentage through the current tab, or none without a denominator.
    pub fn progress_percentage(&self) -> Option<u8> {
        match self.total_albums {
            Some(total) if total > 0 => {
                let pct = (self.albums_processed * 100) / total;
                Some(pct.min(100) as u8)
            }
            _ => None,
        }
    }

    /// Elapsed wall time in milliseconds, still ticking while active.
    pub fn duration_ms(&self) -> i64 {
        let end = self
            .completed_at
            .unwrap_or_else(|| chrono::Utc::now().timestamp_millis());
        (end - self.started_at).max(0)
    }
}

/// Immutable historical log entry, one per finished sync attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncRecord {
    pub id: String,
    /// Unix milliseconds.
    pub sync_timestamp: i64,
    pub albums_created: i64,
    pub albums_updated: i64,
    pub albums_skipped: i64,
    pub albums_failed: i64,
    pub total_albums_in_catalog: i64,
    pub success: bool,
    pub error_message: Option<String>,
}

/// Running totals across all tabs of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncTotals {
    pub created: i64,
    pub updated: i64,
    pub skipped: i64,
    pub failed: i64,
}

impl SyncTotals {
    pub fn processed(&self) -> i64 {
        self.created + self.updated + self.skipped + self.failed
    }
}

/// A tab that could not be processed, with a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabFailure {
    pub tab: String,
    pub reason: String,
}
