//! Database schema for the album catalog.
//!
//! One row per album, keyed by the enrichment service's album ID so that
//! repeat syncs of the same release update in place.

/// SQL schema for the catalog database.
pub const CATALOG_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS albums (
    spotify_album_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    artist_name TEXT NOT NULL,
    artist_id TEXT NOT NULL,
    release_date TEXT,
    genre TEXT NOT NULL DEFAULT '',
    vocal_style TEXT NOT NULL DEFAULT '',
    country TEXT NOT NULL DEFAULT '',
    cover_art_url TEXT,
    spotify_url TEXT NOT NULL,
    total_tracks INTEGER NOT NULL DEFAULT 0,
    label TEXT,
    popularity INTEGER,

    -- Timestamps (Unix milliseconds)
    imported_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_albums_artist ON albums(artist_name);
CREATE INDEX IF NOT EXISTS idx_albums_release_date ON albums(release_date);
"#;
