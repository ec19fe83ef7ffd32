//! Catalog data models.

use chrono::NaiveDate;
use serde::Serialize;

/// A catalogued album.
///
/// Sheet-sourced fields (genre, vocal style, country) live alongside the
/// enrichment-sourced ones; the sheet is authoritative for the former and
/// the enrichment service for the latter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Album {
    pub spotify_album_id: String,
    pub name: String,
    pub artist_name: String,
    pub artist_id: String,
    pub release_date: Option<NaiveDate>,
    pub genre: String,
    pub vocal_style: String,
    pub country: String,
    pub cover_art_url: Option<String>,
    pub spotify_url: String,
    pub total_tracks: i32,
    pub label: Option<String>,
    pub popularity: Option<i32>,
    /// Unix milliseconds.
    pub imported_at: i64,
    /// Unix milliseconds.
    pub updated_at: i64,
}

impl Album {
    /// True when the other album carries no field changes worth writing.
    ///
    /// Timestamps are excluded; they only move when something else does.
    pub fn same_content(&self, other: &Album) -> bool {
        self.name == other.name
            && self.artist_name == other.artist_name
            && self.artist_id == other.artist_id
            && self.release_date == other.release_date
            && self.genre == other.genre
            && self.vocal_style == other.vocal_style
            && self.country == other.country
            && self.cover_art_url == other.cover_art_url
            && self.spotify_url == other.spotify_url
            && self.total_tracks == other.total_tracks
            && self.label == other.label
            && self.popularity == other.popularity
    }
}
