//! HTTP API handlers for bma-server

pub mod auth;
pub mod health;
pub mod library;
pub mod pairing;

pub use auth::{auth_middleware, AuthContext, AuthError};
pub use health::health_routes;
pub use library::{get_artwork, list_albums, list_songs, sniff_image_type, stream_song};
pub use pairing::{disconnect, pair};
