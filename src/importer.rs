//! Turns one sheet row plus its enrichment metadata into a catalog write.

use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::catalog_store::{Album, CatalogStore, UpsertOutcome};
use crate::enrichment::AlbumMetadata;
use crate::sheets::AlbumRow;

/// What importing a single row did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    Created,
    Updated,
    /// The album was already catalogued with identical content.
    Skipped,
}

pub struct AlbumImporter {
    catalog: Arc<dyn CatalogStore>,
}

impl AlbumImporter {
    pub fn new(catalog: Arc<dyn CatalogStore>) -> Self {
        Self { catalog }
    }

    /// Import one album.
    ///
    /// The enrichment service is authoritative for album identity and
    /// metadata; the sheet contributes genre, vocal style, country, and a
    /// fallback release date when the service reports none.
    pub fn import_row(&self, row: &AlbumRow, metadata: &AlbumMetadata) -> Result<RowOutcome> {
        let now = chrono::Utc::now().timestamp_millis();
        let existing = self.catalog.get_album(&metadata.album_id)?;

        let candidate = Album {
            spotify_album_id: metadata.album_id.clone(),
            name: metadata.name.clone(),
            artist_name: metadata.artist_name.clone(),
            artist_id: metadata.artist_id.clone(),
            release_date: metadata.release_date.or(row.release_date),
            genre: row.genre.clone(),
            vocal_style: row.vocal_style.clone(),
            country: row.country.clone(),
            cover_art_url: metadata.cover_art_url.clone(),
            spotify_url: metadata.spotify_url.clone(),
            total_tracks: metadata.total_tracks,
            label: metadata.label.clone(),
            popularity: metadata.popularity,
            imported_at: existing.as_ref().map(|e| e.imported_at).unwrap_or(now),
            updated_at: now,
        };

        if let Some(existing) = &existing {
            if existing.same_content(&candidate) {
                debug!(
                    "Album '{}' by {} unchanged, skipping",
                    candidate.name, candidate.artist_name
                );
                return Ok(RowOutcome::Skipped);
            }
        }

        match self.catalog.upsert_album(&candidate)? {
            UpsertOutcome::Created => Ok(RowOutcome::Created),
            UpsertOutcome::Updated => Ok(RowOutcome::Updated),
        }
    }
}
