//! External enrichment client adapter.
//!
//! Wraps the rate-limited Spotify Web API so that its failure modes never
//! surface as anything other than a per-album recoverable error.

mod client;
mod models;

pub use client::{extract_album_id, EnrichmentClient, SpotifyClient};
pub use models::{AlbumMetadata, EnrichmentError, RetrySettings};
