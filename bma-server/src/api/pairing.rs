//! Pairing and disconnect endpoints

use axum::{extract::State, Extension, Json};
use bma_common::api::{truncate_token, DisconnectResponse, PairingResponse};
use tracing::{info, warn};

use super::auth::AuthContext;
use crate::AppState;

/// POST /pair
///
/// Issues a fresh token. The body is what a pairing QR code would encode.
pub async fn pair(State(state): State<AppState>) -> Json<PairingResponse> {
    let issued = state.trust.issue_token(state.pairing_ttl_minutes);
    info!("Pairing token issued for {}", state.server_url);

    Json(PairingResponse {
        server_url: state.server_url.to_string(),
        token: issued.token,
        expires_at: issued.expires_at,
    })
}

/// POST /disconnect
///
/// Forgets the calling device and revokes its token.
pub async fn disconnect(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Json<DisconnectResponse> {
    if state.trust.disconnect(&auth.token) {
        info!(
            "Disconnect from {} (token {})",
            auth.client_ip,
            truncate_token(&auth.token)
        );
    } else {
        warn!(
            "Disconnect from {} found no device for token {}",
            auth.client_ip,
            truncate_token(&auth.token)
        );
    }

    Json(DisconnectResponse::disconnected())
}
