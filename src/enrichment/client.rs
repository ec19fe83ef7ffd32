//! Spotify Web API client using the client-credentials flow.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::models::{AlbumMetadata, EnrichmentError, RetrySettings};

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const API_BASE_URL: &str = "https://api.spotify.com/v1";

/// Refresh the access token this long before it actually expires.
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 300;

lazy_static! {
    static ref ALBUM_ID_RE: Regex = Regex::new(r"/album/([a-zA-Z0-9]{22})").unwrap();
}

/// Extract the 22-character album ID from a Spotify album URL.
pub fn extract_album_id(spotify_url: &str) -> Option<String> {
    ALBUM_ID_RE
        .captures(spotify_url)
        .map(|caps| caps[1].to_string())
}

/// A metadata lookup service keyed by album ID.
#[async_trait]
pub trait EnrichmentClient: Send + Sync {
    async fn album_metadata(&self, album_id: &str) -> Result<AlbumMetadata, EnrichmentError>;
}

struct CachedToken {
    access_token: String,
    expires_at: i64,
}

impl CachedToken {
    fn expires_soon(&self) -> bool {
        chrono::Utc::now().timestamp() + TOKEN_EXPIRY_MARGIN_SECS >= self.expires_at
    }
}

/// Reqwest-backed Spotify client with token caching and 429 backoff.
pub struct SpotifyClient {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    retry: RetrySettings,
    token: Mutex<Option<CachedToken>>,
    token_url: String,
    api_base_url: String,
}

impl SpotifyClient {
    pub fn new(
        client_id: String,
        client_secret: String,
        timeout_secs: u64,
        retry: RetrySettings,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            client_id,
            client_secret,
            retry,
            token: Mutex::new(None),
            token_url: TOKEN_URL.to_string(),
            api_base_url: API_BASE_URL.to_string(),
        })
    }

    /// Get a valid access token, refreshing via the client-credentials
    /// flow when the cached one is absent or close to expiry.
    async fn access_token(&self) -> Result<String, EnrichmentError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if !token.expires_soon() {
                return Ok(token.access_token.clone());
            }
        }

        debug!("Requesting new Spotify access token");
        let response = self
            .client
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| EnrichmentError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(EnrichmentError::Auth(format!(
                "token endpoint returned status {}",
                response.status()
            )));
        }

        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
            expires_in: i64,
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| EnrichmentError::Parse(e.to_string()))?;

        let token = CachedToken {
            access_token: body.access_token.clone(),
            expires_at: chrono::Utc::now().timestamp() + body.expires_in,
        };
        *cached = Some(token);

        Ok(body.access_token)
    }

    async fn fetch_album(&self, album_id: &str) -> Result<AlbumMetadata, EnrichmentError> {
        let token = self.access_token().await?;
        let url = format!("{}/albums/{}", self.api_base_url, album_id);

        for attempt in 0..=self.retry.max_retries {
            let response = self
                .client
                .get(&url)
                .bearer_auth(&token)
                .send()
                .await
                .map_err(|e| EnrichmentError::Http(e.to_string()))?;

            let status = response.status();

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                if attempt == self.retry.max_retries {
                    warn!(
                        "Rate limited fetching album {}, retries exhausted",
                        album_id
                    );
                    return Err(EnrichmentError::RateLimited);
                }
                let wait_ms = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .map(|secs| secs * 1000)
                    .unwrap_or_else(|| self.retry.backoff_ms(attempt));
                info!(
                    "Rate limited fetching album {}, waiting {}ms (attempt {})",
                    album_id,
                    wait_ms,
                    attempt + 1
                );
                tokio::time::sleep(Duration::from_millis(wait_ms)).await;
                continue;
            }

            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(EnrichmentError::NotFound);
            }
            if status == reqwest::StatusCode::UNAUTHORIZED {
                return Err(EnrichmentError::Auth("access token rejected".to_string()));
            }
            if !status.is_success() {
                return Err(EnrichmentError::Http(format!(
                    "album endpoint returned status {}",
                    status
                )));
            }

            let body: serde_json::Value = response
                .json()
                .await
                .map_err(|e| EnrichmentError::Parse(e.to_string()))?;

            return parse_album_response(&body);
        }

        Err(EnrichmentError::RateLimited)
    }
}

#[cfg(test)]
impl SpotifyClient {
    /// Client pointed at a stub server instead of the real endpoints.
    fn with_base_urls(retry: RetrySettings, token_url: String, api_base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            retry,
            token: Mutex::new(None),
            token_url,
            api_base_url,
        }
    }
}

#[async_trait]
impl EnrichmentClient for SpotifyClient {
    async fn album_metadata(&self, album_id: &str) -> Result<AlbumMetadata, EnrichmentError> {
        let metadata = self.fetch_album(album_id).await?;
        debug!(
            "Fetched metadata for '{}' by {}",
            metadata.name, metadata.artist_name
        );
        Ok(metadata)
    }
}

fn parse_album_response(body: &serde_json::Value) -> Result<AlbumMetadata, EnrichmentError> {
    let album_id = str_field(body, "id")?;
    let name = str_field(body, "name")?;

    let primary_artist = body
        .get("artists")
        .and_then(|a| a.as_array())
        .and_then(|a| a.first())
        .ok_or_else(|| EnrichmentError::Parse("album has no artists".to_string()))?;
    let artist_name = str_field(primary_artist, "name")?;
    let artist_id = str_field(primary_artist, "id")?;

    let release_date = parse_release_date(
        body.get("release_date").and_then(|v| v.as_str()).unwrap_or(""),
        body.get("release_date_precision")
            .and_then(|v| v.as_str())
            .unwrap_or("day"),
    );

    // Images are sorted largest first.
    let cover_art_url = body
        .get("images")
        .and_then(|i| i.as_array())
        .and_then(|i| i.first())
        .and_then(|i| i.get("url"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    let spotify_url = body
        .get("external_urls")
        .and_then(|u| u.get("spotify"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("https://open.spotify.com/album/{}", album_id));

    let genres = body
        .get("genres")
        .and_then(|g| g.as_array())
        .map(|g| {
            g.iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default();

    Ok(AlbumMetadata {
        album_id,
        name,
        artist_name,
        artist_id,
        release_date,
        cover_art_url,
        spotify_url,
        total_tracks: body
            .get("total_tracks")
            .and_then(|v| v.as_i64())
            .unwrap_or(0) as i32,
        label: body
            .get("label")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        popularity: body
            .get("popularity")
            .and_then(|v| v.as_i64())
            .map(|p| p as i32),
        genres,
    })
}

fn str_field(value: &serde_json::Value, field: &str) -> Result<String, EnrichmentError> {
    value
        .get(field)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| EnrichmentError::Parse(format!("missing field '{}'", field)))
}

/// Parse a Spotify release date according to its precision.
///
/// Partial dates default to the first day of the period.
fn parse_release_date(date_str: &str, precision: &str) -> Option<NaiveDate> {
    if date_str.is_empty() {
        return None;
    }
    match precision {
        "day" => NaiveDate::parse_from_str(date_str, "%Y-%m-%d").ok(),
        "month" => NaiveDate::parse_from_str(&format!("{}-01", date_str), "%Y-%m-%d").ok(),
        "year" => NaiveDate::parse_from_str(&format!("{}-01-01", date_str), "%Y-%m-%d").ok(),
        other => {
            warn!("Unknown release date precision: {}", other);
            None
        }
    }
}
