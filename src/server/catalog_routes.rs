//! Catalog HTTP routes: read-only album queries.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::catalog_store::Album;
use crate::server::state::GuardedCatalogStore;

#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

#[derive(Debug, Serialize)]
pub struct AlbumListResponse {
    pub albums: Vec<Album>,
    pub total: i64,
}

/// GET /v1/albums - List catalogued albums, newest release first.
pub async fn list_albums(
    State(catalog): State<GuardedCatalogStore>,
    Query(query): Query<PaginationQuery>,
) -> impl IntoResponse {
    let limit = query.limit.min(100);
    let albums = match catalog.list_albums(limit, query.offset) {
        Ok(albums) => albums,
        Err(e) => {
            error!("Failed to list albums: {:#}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    match catalog.album_count() {
        Ok(total) => Json(AlbumListResponse { albums, total }).into_response(),
        Err(e) => {
            error!("Failed to count albums: {:#}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// GET /v1/albums/{id} - One album by its enrichment-service ID.
pub async fn get_album(
    State(catalog): State<GuardedCatalogStore>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match catalog.get_album(&id) {
        Ok(Some(album)) => Json(album).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            error!("Failed to get album {}: {:#}", id, e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
