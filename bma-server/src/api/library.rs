//! Catalog endpoints: songs, albums, streaming, artwork

use axum::{
    body::Body,
    extract::{Path, Request, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use bma_common::api::{AlbumResponse, AlbumSongEntry, SongResponse};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::debug;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::library::{Album, TrackRecord};
use crate::AppState;

/// PNG file signature prefix
const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47];

const ARTWORK_CACHE_CONTROL: &str = "public, max-age=3600";

/// GET /songs
pub async fn list_songs(State(state): State<AppState>) -> Json<Vec<SongResponse>> {
    let snapshot = state.library.snapshot();
    let songs = snapshot
        .songs()
        .iter()
        .enumerate()
        .map(|(sort_order, song)| song_response(song, sort_order))
        .collect();
    Json(songs)
}

/// GET /albums
pub async fn list_albums(State(state): State<AppState>) -> Json<Vec<AlbumResponse>> {
    let snapshot = state.library.snapshot();
    Json(snapshot.albums().iter().map(album_response).collect())
}

/// GET /stream/:id
///
/// Byte ranges are honoured so clients can seek.
pub async fn stream_song(
    State(state): State<AppState>,
    Path(id): Path<String>,
    request: Request,
) -> ApiResult<Response> {
    let song = find_song(&state, &id)?;
    ensure_streamable(&song.path).await?;

    debug!("Streaming {}", song.path.display());

    let response = match ServeFile::new(&song.path).oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    let mut response = response.map(Body::new);

    if response.status().is_success() {
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static("audio/mpeg"));
    }

    Ok(response)
}

/// GET /artwork/:id
pub async fn get_artwork(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let song = find_song(&state, &id)?;
    let data = song
        .artwork()
        .ok_or_else(|| ApiError::NotFound(format!("No artwork for song {}", song.id)))?;

    Ok((
        [
            (header::CONTENT_TYPE, sniff_image_type(data)),
            (header::CACHE_CONTROL, ARTWORK_CACHE_CONTROL),
        ],
        Body::from(data.to_vec()),
    )
        .into_response())
}

/// Content type of embedded artwork: PNG by signature, JPEG otherwise
pub fn sniff_image_type(data: &[u8]) -> &'static str {
    if data.starts_with(PNG_MAGIC) {
        "image/png"
    } else {
        "image/jpeg"
    }
}

/// The audio file must still exist as a regular file
///
/// A vanished file is 404; any other filesystem failure is an I/O error.
async fn ensure_streamable(path: &std::path::Path) -> ApiResult<()> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) if metadata.is_file() => Ok(()),
        Ok(_) => Err(ApiError::NotFound(format!(
            "Not a file: {}",
            path.display()
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ApiError::NotFound(format!(
            "File missing: {}",
            path.display()
        ))),
        Err(e) => Err(ApiError::Io(e)),
    }
}

/// Look a song up by its textual id; malformed ids are simply not found
fn find_song(state: &AppState, id: &str) -> ApiResult<TrackRecord> {
    Uuid::parse_str(id)
        .ok()
        .and_then(|uuid| state.library.song(uuid))
        .ok_or_else(|| ApiError::NotFound(format!("Song not found: {}", id)))
}

fn song_response(song: &TrackRecord, sort_order: usize) -> SongResponse {
    SongResponse {
        id: song.id,
        filename: song.filename.clone(),
        title: song.title.clone(),
        artist: song.artist.clone().unwrap_or_default(),
        album: song.album.clone().unwrap_or_default(),
        track_number: song.track_number,
        parent_directory: song.parent_directory.to_string_lossy().into_owned(),
        has_artwork: song.has_artwork(),
        sort_order,
    }
}

fn album_response(album: &Album) -> AlbumResponse {
    AlbumResponse {
        id: album.id,
        name: album.name.clone(),
        artist: album.artist.clone().unwrap_or_default(),
        track_count: album.track_count(),
        songs: album
            .tracks
            .iter()
            .map(|track| AlbumSongEntry {
                id: track.id,
                title: track.title.clone(),
                artist: track.artist.clone().unwrap_or_default(),
                track_number: track.track_number,
                has_artwork: track.has_artwork(),
            })
            .collect(),
    }
}
