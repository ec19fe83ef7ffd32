//! Failure classification for a sync run.

use thiserror::Error;

use crate::sheets::SheetError;

/// How badly something went wrong, and what it takes down with it.
///
/// The orchestrator branches on these tags instead of propagating: album
/// and tab failures are contained, critical failures abort the run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("{0}")]
    Critical(String),

    #[error("tab '{tab}': {reason}")]
    Tab { tab: String, reason: String },

    #[error("album '{album}': {reason}")]
    Album { album: String, reason: String },
}

impl SyncError {
    /// Classify a workbook read failure. A malformed document takes the
    /// whole run down; everything else only fails the tab it names.
    pub fn from_sheet_error(tab: &str, err: SheetError) -> Self {
        match err {
            SheetError::Malformed(msg) => {
                SyncError::Critical(format!("unreadable workbook: {}", msg))
            }
            other => SyncError::Tab {
                tab: tab.to_string(),
                reason: other.to_string(),
            },
        }
    }
}
