//! Health and server info endpoints (no auth)

use axum::{extract::State, routing::get, Json, Router};
use bma_common::api::{HealthResponse, InfoResponse, LibraryInfo};

use crate::AppState;

/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "bma-server".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /info
///
/// Library statistics for clients deciding whether to pair.
pub async fn server_info(State(state): State<AppState>) -> Json<InfoResponse> {
    let library = &state.library;
    let song_count = library.song_count();

    Json(InfoResponse {
        server: "BMA Server".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        http_port: state.port,
        protocol: "http".to_string(),
        library: LibraryInfo {
            album_count: library.album_count(),
            song_count,
            has_library: song_count > 0,
            is_scanning: library.is_scanning(),
            music_path: library
                .root()
                .map(|root| root.to_string_lossy().into_owned()),
        },
    })
}

/// Build public status routes
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(server_info))
}
