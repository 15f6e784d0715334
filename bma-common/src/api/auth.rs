//! Bearer token authentication helpers
//!
//! Clients authenticate every protected call with
//! `Authorization: Bearer <token>`, where the token was obtained from the
//! pairing endpoint. This module holds the pieces of that check that do not
//! need an HTTP framework or the token store:
//!
//! - parsing the `Authorization` header into a token
//! - the failure taxonomy reported by the gate
//! - proxy header handling for client IP derivation
//! - log-safe token truncation and device naming
//!
//! Token validity itself lives with the token store in the server crate.

use thiserror::Error;

/// Required prefix of the `Authorization` header value
pub const BEARER_PREFIX: &str = "Bearer ";

// ========================================
// Error Types
// ========================================

/// Reasons a request can fail authentication
///
/// All variants are reported to clients identically (401 with an
/// `authentication_failed` body); they stay distinct for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthFailure {
    /// No `Authorization` header present
    #[error("Missing authorization token")]
    MissingToken,

    /// Header present but not of the form `Bearer <token>`
    #[error("Invalid authorization format")]
    MalformedToken,

    /// `Bearer ` prefix followed by nothing
    #[error("Empty authorization token")]
    EmptyToken,

    /// Token not known to the server (never issued, or revoked)
    #[error("Invalid or expired token")]
    InvalidToken,

    /// Token was issued but its expiry has passed
    #[error("Invalid or expired token")]
    ExpiredToken,
}

impl AuthFailure {
    /// Short machine-readable label used in log lines
    pub fn kind(&self) -> &'static str {
        match self {
            AuthFailure::MissingToken => "missing",
            AuthFailure::MalformedToken => "malformed",
            AuthFailure::EmptyToken => "empty",
            AuthFailure::InvalidToken => "invalid",
            AuthFailure::ExpiredToken => "expired",
        }
    }
}

// ========================================
// Header Parsing
// ========================================

/// Extract the bearer token from an `Authorization` header value
///
/// The prefix match is case-sensitive, matching what paired clients send.
/// An empty header value counts as missing, the same as no header.
///
/// # Examples
///
/// ```
/// use bma_common::api::auth::{parse_bearer, AuthFailure};
///
/// assert_eq!(parse_bearer(Some("Bearer abc123")), Ok("abc123"));
/// assert_eq!(parse_bearer(None), Err(AuthFailure::MissingToken));
/// assert_eq!(parse_bearer(Some("")), Err(AuthFailure::MissingToken));
/// assert_eq!(parse_bearer(Some("Basic xxx")), Err(AuthFailure::MalformedToken));
/// assert_eq!(parse_bearer(Some("Bearer ")), Err(AuthFailure::EmptyToken));
/// ```
pub fn parse_bearer(header: Option<&str>) -> Result<&str, AuthFailure> {
    let header = match header {
        Some(value) if !value.is_empty() => value,
        _ => return Err(AuthFailure::MissingToken),
    };

    let token = header
        .strip_prefix(BEARER_PREFIX)
        .ok_or(AuthFailure::MalformedToken)?;

    if token.is_empty() {
        return Err(AuthFailure::EmptyToken);
    }

    Ok(token)
}

/// First entry of a comma-separated forwarding header (`X-Forwarded-For` style)
///
/// Returns `None` when the first entry is blank.
pub fn first_forwarded_entry(value: &str) -> Option<&str> {
    value
        .split(',')
        .next()
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
}

// ========================================
// Logging / Display Helpers
// ========================================

/// Truncate a token for logging
///
/// Tokens of 8 characters or fewer are fully masked.
///
/// # Examples
///
/// ```
/// use bma_common::api::auth::truncate_token;
///
/// assert_eq!(truncate_token("0123456789abcdef"), "01234567...");
/// assert_eq!(truncate_token("short"), "*****");
/// ```
pub fn truncate_token(token: &str) -> String {
    let count = token.chars().count();
    if count <= 8 {
        return "*".repeat(count);
    }
    let prefix: String = token.chars().take(8).collect();
    format!("{}...", prefix)
}

/// User-agent substring to display name, checked in order
const DEVICE_NAMES: &[(&str, &str)] = &[
    ("Android", "Android Device"),
    ("iPhone", "iPhone"),
    ("iPad", "iPad"),
    ("Mac", "Mac"),
    ("BMA", "BMA App"),
];

/// Best-effort device name for a client user-agent
pub fn device_name_from_user_agent(user_agent: &str) -> &'static str {
    DEVICE_NAMES
        .iter()
        .find(|(needle, _)| user_agent.contains(needle))
        .map(|(_, name)| *name)
        .unwrap_or("Unknown Device")
}

// ========================================
// Tests
// ========================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bearer_accepts_well_formed_header() {
        assert_eq!(
            parse_bearer(Some("Bearer 6f1c2a7e-0000-4000-8000-000000000000")),
            Ok("6f1c2a7e-0000-4000-8000-000000000000")
        );
    }

    #[test]
    fn test_parse_bearer_rejects_missing_and_blank_header() {
        assert_eq!(parse_bearer(None), Err(AuthFailure::MissingToken));
        assert_eq!(parse_bearer(Some("")), Err(AuthFailure::MissingToken));
    }

    #[test]
    fn test_parse_bearer_rejects_other_schemes() {
        assert_eq!(parse_bearer(Some("Basic xxx")), Err(AuthFailure::MalformedToken));
        assert_eq!(parse_bearer(Some("bearer abc")), Err(AuthFailure::MalformedToken));
        // No separating space
        assert_eq!(parse_bearer(Some("Bearer")), Err(AuthFailure::MalformedToken));
    }

    #[test]
    fn test_parse_bearer_rejects_empty_token() {
        assert_eq!(parse_bearer(Some("Bearer ")), Err(AuthFailure::EmptyToken));
    }

    #[test]
    fn test_failures_share_client_message_for_invalid_and_expired() {
        assert_eq!(
            AuthFailure::InvalidToken.to_string(),
            AuthFailure::ExpiredToken.to_string()
        );
        assert_ne!(AuthFailure::InvalidToken.kind(), AuthFailure::ExpiredToken.kind());
    }

    #[test]
    fn test_first_forwarded_entry() {
        assert_eq!(
            first_forwarded_entry("203.0.113.7, 10.0.0.1"),
            Some("203.0.113.7")
        );
        assert_eq!(first_forwarded_entry("  198.51.100.2 "), Some("198.51.100.2"));
        assert_eq!(first_forwarded_entry(" , 10.0.0.1"), None);
        assert_eq!(first_forwarded_entry(""), None);
    }

    #[test]
    fn test_truncate_token() {
        assert_eq!(truncate_token("abcdefgh"), "********");
        assert_eq!(truncate_token("abcdefghi"), "abcdefgh...");
        assert_eq!(truncate_token(""), "");
    }

    #[test]
    fn test_device_name_lookup() {
        assert_eq!(
            device_name_from_user_agent("Mozilla/5.0 (Linux; Android 14; Pixel 8)"),
            "Android Device"
        );
        assert_eq!(
            device_name_from_user_agent("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0)"),
            "iPhone"
        );
        assert_eq!(device_name_from_user_agent("Mozilla/5.0 (iPad; CPU OS 17_0)"), "iPad");
        assert_eq!(
            device_name_from_user_agent("Mozilla/5.0 (Macintosh; Intel Mac OS X 14_0)"),
            "Mac"
        );
        assert_eq!(device_name_from_user_agent("BMA/2.1 okhttp/4.12.0"), "BMA App");
        assert_eq!(device_name_from_user_agent("curl/8.4.0"), "Unknown Device");
        assert_eq!(device_name_from_user_agent(""), "Unknown Device");
    }
}
