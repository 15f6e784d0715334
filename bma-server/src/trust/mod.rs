//! Trust layer: pairing tokens and the devices using them
//!
//! Tokens and device sessions live behind separate locks; no operation here
//! holds both at once.

pub mod devices;
pub mod tokens;

pub use devices::{DeviceSession, DeviceTracker, TouchOutcome};
pub use tokens::{IssuedToken, TokenAuthority, TokenStatus};

use bma_common::time::{Clock, SystemClock};
use chrono::Duration;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Token authority plus device tracker
pub struct TrustLayer {
    tokens: TokenAuthority,
    devices: DeviceTracker,
}

impl TrustLayer {
    /// Trust layer on wall-clock time
    pub fn new(device_inactivity: Duration) -> Self {
        Self::with_clock(Arc::new(SystemClock), device_inactivity)
    }

    pub fn with_clock(clock: Arc<dyn Clock>, device_inactivity: Duration) -> Self {
        Self {
            tokens: TokenAuthority::new(Arc::clone(&clock)),
            devices: DeviceTracker::new(clock, device_inactivity),
        }
    }

    // ========================================
    // Tokens
    // ========================================

    pub fn issue_token(&self, ttl_minutes: i64) -> IssuedToken {
        self.tokens.issue(ttl_minutes)
    }

    pub fn check_token(&self, token: &str) -> TokenStatus {
        self.tokens.check(token)
    }

    pub fn is_valid(&self, token: &str) -> bool {
        self.tokens.is_valid(token)
    }

    pub fn revoke(&self, token: &str) {
        self.tokens.revoke(token);
    }

    pub fn revoke_all(&self) {
        self.tokens.revoke_all();
    }

    pub fn current_token(&self) -> Option<String> {
        self.tokens.current()
    }

    pub fn active_token_count(&self) -> usize {
        self.tokens.active_count()
    }

    // ========================================
    // Devices
    // ========================================

    /// Record an authenticated request, then reap idle sessions
    pub fn track_authenticated(&self, token: &str, ip: &str, user_agent: &str) {
        if self.devices.touch(token, ip, user_agent) == TouchOutcome::Connected {
            self.devices.reap_inactive();
        }
    }

    /// Drop the device using `token` and revoke the token
    ///
    /// Returns `false` (and leaves the token alone) when no device is using
    /// it.
    pub fn disconnect(&self, token: &str) -> bool {
        if self.devices.remove(token).is_none() {
            return false;
        }
        self.tokens.revoke(token);
        true
    }

    pub fn list_devices(&self) -> Vec<DeviceSession> {
        self.devices.list()
    }

    pub fn device_count(&self) -> usize {
        self.devices.count()
    }

    pub fn reap_inactive(&self) -> usize {
        self.devices.reap_inactive()
    }

    pub fn clear_devices(&self) {
        self.devices.clear();
    }

    /// Revoke every token and forget every device
    pub fn reset(&self) {
        self.revoke_all();
        self.clear_devices();
        info!("Trust state reset");
    }
}

/// Periodically reap idle device sessions
pub fn spawn_reaper(trust: Arc<TrustLayer>, interval: std::time::Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let reaped = trust.reap_inactive();
            debug!(
                reaped,
                devices = trust.device_count(),
                tokens = trust.active_token_count(),
                "Device reaper pass"
            );
        }
    })
}
