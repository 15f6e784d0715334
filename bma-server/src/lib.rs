//! bma-server library - music catalog and pairing server
//!
//! Serves a scanned music folder to paired mobile clients. Catalog and
//! streaming routes sit behind bearer-token authentication; pairing,
//! health and info are public.

use axum::Router;
use std::net::{IpAddr, UdpSocket};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod library;
pub mod trust;

use library::LibraryEngine;
use trust::TrustLayer;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub library: Arc<LibraryEngine>,
    pub trust: Arc<TrustLayer>,
    /// Base URL handed to clients in pairing responses
    pub server_url: Arc<str>,
    pub port: u16,
    pub pairing_ttl_minutes: i64,
}

impl AppState {
    pub fn new(
        library: Arc<LibraryEngine>,
        trust: Arc<TrustLayer>,
        server_url: impl Into<Arc<str>>,
        port: u16,
        pairing_ttl_minutes: i64,
    ) -> Self {
        Self {
            library,
            trust,
            server_url: server_url.into(),
            port,
            pairing_ttl_minutes,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};

    // Protected routes (require a paired token)
    let protected = Router::new()
        .route("/songs", get(api::list_songs))
        .route("/albums", get(api::list_albums))
        .route("/stream/:id", get(api::stream_song))
        .route("/artwork/:id", get(api::get_artwork))
        .route("/disconnect", post(api::disconnect))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    // Public routes
    let public = Router::new()
        .route("/pair", post(api::pair))
        .merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// URL advertised to clients: the configured one, else `http://<lan-ip>:<port>`
pub fn advertised_server_url(configured: Option<&str>, port: u16) -> String {
    match configured {
        Some(url) => url.to_string(),
        None => {
            let host = local_ip()
                .map(|ip| ip.to_string())
                .unwrap_or_else(|| "localhost".to_string());
            format!("http://{}:{}", host, port)
        }
    }
}

/// Address of the interface that routes outward
///
/// Connecting a UDP socket sends nothing; it only selects a route.
pub fn local_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    let ip = socket.local_addr().ok()?.ip();
    (!ip.is_unspecified()).then_some(ip)
}
