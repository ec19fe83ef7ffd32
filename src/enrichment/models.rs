//! Enrichment data types and failure classification.

use chrono::NaiveDate;
use thiserror::Error;

/// Album metadata obtained from the enrichment service.
#[derive(Debug, Clone, PartialEq)]
pub struct AlbumMetadata {
    /// The service's stable album identifier (22 alphanumeric characters).
    pub album_id: String,
    pub name: String,
    pub artist_name: String,
    pub artist_id: String,
    pub release_date: Option<NaiveDate>,
    pub cover_art_url: Option<String>,
    pub spotify_url: String,
    pub total_tracks: i32,
    pub label: Option<String>,
    pub popularity: Option<i32>,
    pub genres: Vec<String>,
}

/// Failures of a single enrichment lookup.
///
/// All variants are album-scoped recoverable from the orchestrator's
/// viewpoint; `RateLimited` is only ever seen by callers after the client
/// has exhausted its retries.
#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("album not found")]
    NotFound,

    #[error("rate limited, retries exhausted")]
    RateLimited,

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("request failed: {0}")]
    Http(String),

    #[error("unexpected response: {0}")]
    Parse(String),
}

/// Backoff settings for rate-limit retries.
///
/// The wait is the service-specified `Retry-After` when given, otherwise
/// `base_backoff_ms * 2^attempt`, for at most `max_retries` attempts.
#[derive(Debug, Clone)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_backoff_ms: u64,
}

impl RetrySettings {
    /// Backoff in milliseconds for a given attempt (0-based).
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        self.base_backoff_ms.saturating_mul(1u64 << attempt.min(16))
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_backoff_ms: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let settings = RetrySettings {
            max_retries: 3,
            base_backoff_ms: 100,
        };
        assert_eq!(settings.backoff_ms(0), 100);
        assert_eq!(settings.backoff_ms(1), 200);
        assert_eq!(settings.backoff_ms(2), 400);
        assert_eq!(settings.backoff_ms(3), 800);
    }

    #[test]
    fn test_backoff_does_not_overflow() {
        let settings = RetrySettings {
            max_retries: 100,
            base_backoff_ms: u64::MAX / 2,
        };
        // saturates instead of wrapping
        assert_eq!(settings.backoff_ms(60), u64::MAX);
    }
}
