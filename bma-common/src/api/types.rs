//! Shared API request/response types
//!
//! Field names are camelCase on the wire to match what the mobile clients
//! already parse.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ========================================
// Pairing
// ========================================

/// Response body of `POST /pair`
///
/// The same JSON is what a pairing QR code would carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingResponse {
    /// Base URL the client should use for subsequent calls
    pub server_url: String,

    /// Bearer token to send as `Authorization: Bearer <token>`
    pub token: String,

    /// Absolute expiry of the token (RFC 3339)
    pub expires_at: DateTime<Utc>,
}

/// Response body of `POST /disconnect`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisconnectResponse {
    pub status: String,
    pub message: String,
}

impl DisconnectResponse {
    pub fn disconnected() -> Self {
        Self {
            status: "disconnected".to_string(),
            message: "Device successfully disconnected".to_string(),
        }
    }
}

// ========================================
// Library
// ========================================

/// One entry of `GET /songs`
///
/// `sort_order` is the position in the server's sorted catalog; clients keep
/// it instead of re-sorting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongResponse {
    pub id: Uuid,
    pub filename: String,
    pub title: String,
    /// Empty string when unknown
    pub artist: String,
    /// Empty string when unknown
    pub album: String,
    /// 0 when unknown
    pub track_number: u32,
    pub parent_directory: String,
    pub has_artwork: bool,
    pub sort_order: usize,
}

/// Track entry nested inside [`AlbumResponse`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumSongEntry {
    pub id: Uuid,
    pub title: String,
    pub artist: String,
    pub track_number: u32,
    pub has_artwork: bool,
}

/// One entry of `GET /albums`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumResponse {
    pub id: Uuid,
    pub name: String,
    pub artist: String,
    pub track_count: usize,
    pub songs: Vec<AlbumSongEntry>,
}

// ========================================
// Service Status
// ========================================

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
}

/// Library statistics nested in [`InfoResponse`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryInfo {
    pub album_count: usize,
    pub song_count: usize,
    pub has_library: bool,
    pub is_scanning: bool,
    pub music_path: Option<String>,
}

/// Response body of `GET /info`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoResponse {
    pub server: String,
    pub version: String,
    pub http_port: u16,
    pub protocol: String,
    pub library: LibraryInfo,
}

// ========================================
// Error Response Types
// ========================================

/// Body returned with every 401 from the authentication gate
///
/// # Examples
///
/// ```
/// use bma_common::api::types::AuthErrorResponse;
///
/// let body = AuthErrorResponse::new("Missing authorization token");
/// assert_eq!(body.error, "authentication_failed");
/// assert_eq!(body.status, 401);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthErrorResponse {
    /// Always `authentication_failed`
    pub error: String,

    /// Human-readable reason
    pub message: String,

    /// HTTP status code (401)
    pub status: u16,
}

impl AuthErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: "authentication_failed".to_string(),
            message: message.into(),
            status: 401,
        }
    }
}
