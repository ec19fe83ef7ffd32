//! SQLite store for the album catalog.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

use super::models::Album;
use super::schema::CATALOG_SCHEMA_SQL;

/// What an upsert did to the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Trait for catalog storage operations.
pub trait CatalogStore: Send + Sync {
    /// Get an album by its enrichment-service ID.
    fn get_album(&self, spotify_album_id: &str) -> Result<Option<Album>>;

    /// Insert or replace an album, reporting whether it was new.
    fn upsert_album(&self, album: &Album) -> Result<UpsertOutcome>;

    /// Total number of catalogued albums.
    fn album_count(&self) -> Result<i64>;

    /// List albums, newest release first, yearless last.
    fn list_albums(&self, limit: usize, offset: usize) -> Result<Vec<Album>>;
}

/// SQLite implementation of CatalogStore.
pub struct SqliteCatalogStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCatalogStore {
    /// Open or create a catalog database.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open catalog database: {:?}", path))?;
        conn.execute_batch(CATALOG_SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(CATALOG_SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn row_to_album(row: &rusqlite::Row) -> rusqlite::Result<Album> {
        let release_date: Option<String> = row.get("release_date")?;
        Ok(Album {
            spotify_album_id: row.get("spotify_album_id")?,
            name: row.get("name")?,
            artist_name: row.get("artist_name")?,
            artist_id: row.get("artist_id")?,
            release_date: release_date
                .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
            genre: row.get("genre")?,
            vocal_style: row.get("vocal_style")?,
            country: row.get("country")?,
            cover_art_url: row.get("cover_art_url")?,
            spotify_url: row.get("spotify_url")?,
            total_tracks: row.get("total_tracks")?,
            label: row.get("label")?,
            popularity: row.get("popularity")?,
            imported_at: row.get("imported_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

impl CatalogStore for SqliteCatalogStore {
    fn get_album(&self, spotify_album_id: &str) -> Result<Option<Album>> {
        let conn = self.conn.lock().unwrap();
        let result = conn
            .query_row(
                "SELECT * FROM albums WHERE spotify_album_id = ?1",
                params![spotify_album_id],
                Self::row_to_album,
            )
            .optional()?;
        Ok(result)
    }

    fn upsert_album(&self, album: &Album) -> Result<UpsertOutcome> {
        let conn = self.conn.lock().unwrap();
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM albums WHERE spotify_album_id = ?1)",
            params![album.spotify_album_id],
            |row| row.get(0),
        )?;

        conn.execute(
            r#"
            INSERT INTO albums (
                spotify_album_id, name, artist_name, artist_id, release_date,
                genre, vocal_style, country, cover_art_url, spotify_url,
                total_tracks, label, popularity, imported_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15
            )
            ON CONFLICT(spotify_album_id) DO UPDATE SET
                name = excluded.name,
                artist_name = excluded.artist_name,
                artist_id = excluded.artist_id,
                release_date = excluded.release_date,
                genre = excluded.genre,
                vocal_style = excluded.vocal_style,
                country = excluded.country,
                cover_art_url = excluded.cover_art_url,
                spotify_url = excluded.spotify_url,
                total_tracks = excluded.total_tracks,
                label = excluded.label,
                popularity = excluded.popularity,
                updated_at = excluded.updated_at
            "#,
            params![
                album.spotify_album_id,
                album.name,
                album.artist_name,
                album.artist_id,
                album.release_date.map(|d| d.format("%Y-%m-%d").to_string()),
                album.genre,
                album.vocal_style,
                album.country,
                album.cover_art_url,
                album.spotify_url,
                album.total_tracks,
                album.label,
                album.popularity,
                album.imported_at,
                album.updated_at,
            ],
        )?;

        Ok(if exists {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Created
        })
    }

    fn album_count(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM albums", [], |row| row.get(0))?;
        Ok(count)
    }

    fn list_albums(&self, limit: usize, offset: usize) -> Result<Vec<Album>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"
            SELECT * FROM albums
            ORDER BY release_date IS NULL, release_date DESC, artist_name ASC
            LIMIT ?1 OFFSET ?2
            "#,
        )?;
        let albums = stmt
            .query_map(params![limit as i64, offset as i64], Self::row_to_album)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(albums)
    }
}
