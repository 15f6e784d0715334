//! Pairing token authority
//!
//! Tokens are random UUID v4 strings with an absolute expiry. Expiry is
//! checked lazily: an expired token stays in the map until someone asks
//! about it or a new token is issued.

use bma_common::api::truncate_token;
use bma_common::time::Clock;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};
use uuid::Uuid;

/// A freshly issued pairing token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Result of looking a token up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    Valid,
    /// Known but past its expiry (now evicted)
    Expired,
    /// Never issued, revoked, or already evicted
    Unknown,
}

#[derive(Debug, Default)]
struct TokenState {
    tokens: HashMap<String, DateTime<Utc>>,
    /// Most recently issued token, kept for display
    current: Option<String>,
}

/// Issues, validates and revokes pairing tokens
pub struct TokenAuthority {
    state: RwLock<TokenState>,
    clock: Arc<dyn Clock>,
}

impl TokenAuthority {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(TokenState::default()),
            clock,
        }
    }

    /// Issue a new token valid for `ttl_minutes`
    ///
    /// Earlier tokens stay valid. Tokens already past expiry are purged.
    pub fn issue(&self, ttl_minutes: i64) -> IssuedToken {
        let now = self.clock.now();
        let token = Uuid::new_v4().to_string();
        let expires_at = now + Duration::minutes(ttl_minutes);

        let purged = {
            let mut state = self.write();
            let before = state.tokens.len();
            state.tokens.retain(|_, expiry| *expiry > now);
            let purged = before - state.tokens.len();

            state.tokens.insert(token.clone(), expires_at);
            state.current = Some(token.clone());
            purged
        };

        if purged > 0 {
            debug!("Purged {} expired tokens", purged);
        }
        info!(
            "Issued pairing token {} (expires {})",
            truncate_token(&token),
            expires_at.to_rfc3339()
        );

        IssuedToken { token, expires_at }
    }

    /// Look a token up, evicting it if expired
    pub fn check(&self, token: &str) -> TokenStatus {
        let now = self.clock.now();
        let mut state = self.write();

        let Some(&expires_at) = state.tokens.get(token) else {
            return TokenStatus::Unknown;
        };

        // Valid only while the expiry is still in the future
        if now >= expires_at {
            state.tokens.remove(token);
            if state.current.as_deref() == Some(token) {
                state.current = None;
            }
            return TokenStatus::Expired;
        }

        TokenStatus::Valid
    }

    pub fn is_valid(&self, token: &str) -> bool {
        self.check(token) == TokenStatus::Valid
    }

    /// Invalidate one token immediately
    pub fn revoke(&self, token: &str) {
        let removed = {
            let mut state = self.write();
            if state.current.as_deref() == Some(token) {
                state.current = None;
            }
            state.tokens.remove(token).is_some()
        };

        if removed {
            info!("Revoked token {}", truncate_token(token));
        }
    }

    /// Invalidate every token
    pub fn revoke_all(&self) {
        let count = {
            let mut state = self.write();
            let count = state.tokens.len();
            state.tokens.clear();
            state.current = None;
            count
        };
        info!("Revoked all tokens ({})", count);
    }

    pub fn current(&self) -> Option<String> {
        self.read().current.clone()
    }

    /// Number of tokens in the map, including any not yet evicted
    pub fn active_count(&self) -> usize {
        self.read().tokens.len()
    }

    fn read(&self) -> RwLockReadGuard<'_, TokenState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, TokenState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}
