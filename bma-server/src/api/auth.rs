//! Authentication gate
//!
//! Wraps every protected route. A request passes only with
//! `Authorization: Bearer <token>` carrying a live pairing token; the device
//! behind it is then recorded and an [`AuthContext`] is attached for the
//! handler.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use bma_common::api::{first_forwarded_entry, parse_bearer, truncate_token, AuthErrorResponse, AuthFailure};
use std::net::SocketAddr;
use tracing::{debug, warn};

use crate::trust::TokenStatus;
use crate::AppState;

/// Identity of an authenticated request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub token: String,
    pub client_ip: String,
    pub user_agent: String,
}

/// Authentication middleware
///
/// Check order: header present, `Bearer ` prefix, non-empty token, token
/// known and unexpired.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let connect_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client_ip = client_ip(request.headers(), connect_addr);

    let token = match bearer_token(request.headers()) {
        Ok(token) => token,
        Err(failure) => {
            warn!(
                kind = failure.kind(),
                client_ip = %client_ip,
                path = %request.uri().path(),
                "Authentication failed: {}",
                failure
            );
            return Err(AuthError(failure));
        }
    };

    let failure = match state.trust.check_token(&token) {
        TokenStatus::Valid => None,
        TokenStatus::Expired => Some(AuthFailure::ExpiredToken),
        TokenStatus::Unknown => Some(AuthFailure::InvalidToken),
    };
    if let Some(failure) = failure {
        warn!(
            kind = failure.kind(),
            token = %truncate_token(&token),
            client_ip = %client_ip,
            path = %request.uri().path(),
            "Authentication failed: {}",
            failure
        );
        return Err(AuthError(failure));
    }

    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .unwrap_or("unknown")
        .to_string();

    state
        .trust
        .track_authenticated(&token, &client_ip, &user_agent);

    debug!(
        token = %truncate_token(&token),
        client_ip = %client_ip,
        path = %request.uri().path(),
        "Authenticated request"
    );

    request.extensions_mut().insert(AuthContext {
        token,
        client_ip,
        user_agent,
    });

    Ok(next.run(request).await)
}

/// Parse the `Authorization` header
fn bearer_token(headers: &HeaderMap) -> Result<String, AuthFailure> {
    let value = match headers.get(header::AUTHORIZATION) {
        Some(value) => Some(value.to_str().map_err(|_| AuthFailure::MalformedToken)?),
        None => None,
    };
    parse_bearer(value).map(str::to_string)
}

/// Client address, preferring proxy headers over the socket peer
///
/// Order: `X-Forwarded-For` (first entry), `X-Real-IP`,
/// `X-Original-Forwarded-For` (first entry), connection address.
pub fn client_ip(headers: &HeaderMap, connect_addr: Option<SocketAddr>) -> String {
    let header_str = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());

    header_str("x-forwarded-for")
        .and_then(first_forwarded_entry)
        .or_else(|| header_str("x-real-ip").map(str::trim).filter(|ip| !ip.is_empty()))
        .or_else(|| header_str("x-original-forwarded-for").and_then(first_forwarded_entry))
        .map(str::to_string)
        .or_else(|| connect_addr.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Rejection from the authentication gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthError(pub AuthFailure);

impl From<AuthFailure> for AuthError {
    fn from(failure: AuthFailure) -> Self {
        Self(failure)
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, "Bearer")],
            Json(AuthErrorResponse::new(self.0.to_string())),
        )
            .into_response()
    }
}
