//! API module for shared HTTP API functionality
//!
//! # Design Principle
//!
//! This module contains ONLY:
//! - Pure functions (no HTTP framework dependencies)
//! - Shared wire types
//!
//! The server wraps these with axum middleware and handlers.

pub mod auth;
pub mod types;

pub use auth::{
    device_name_from_user_agent, first_forwarded_entry, parse_bearer, truncate_token,
    AuthFailure, BEARER_PREFIX,
};
pub use types::{
    AlbumResponse, AlbumSongEntry, AuthErrorResponse, DisconnectResponse, HealthResponse,
    InfoResponse, LibraryInfo, PairingResponse, SongResponse,
};
