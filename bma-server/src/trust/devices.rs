//! Device session tracking
//!
//! One session per token that has authenticated at least once. Sessions are
//! refreshed on every authenticated request and reaped after a period of
//! inactivity.

use bma_common::api::{device_name_from_user_agent, truncate_token};
use bma_common::time::Clock;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::info;
use uuid::Uuid;

/// A connected client
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSession {
    pub id: Uuid,
    #[serde(skip)]
    pub token: String,
    pub name: String,
    pub ip: String,
    pub user_agent: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Whether [`DeviceTracker::touch`] created a session or refreshed one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchOutcome {
    Connected,
    Refreshed,
}

/// Sessions keyed by token
pub struct DeviceTracker {
    sessions: RwLock<HashMap<String, DeviceSession>>,
    inactivity: Duration,
    clock: Arc<dyn Clock>,
}

impl DeviceTracker {
    pub fn new(clock: Arc<dyn Clock>, inactivity: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            inactivity,
            clock,
        }
    }

    /// Create or refresh the session for `token`
    pub fn touch(&self, token: &str, ip: &str, user_agent: &str) -> TouchOutcome {
        let now = self.clock.now();
        let mut sessions = self.write();

        if let Some(session) = sessions.get_mut(token) {
            session.last_seen = now;
            session.ip = ip.to_string();
            session.user_agent = user_agent.to_string();
            return TouchOutcome::Refreshed;
        }

        let session = DeviceSession {
            id: Uuid::new_v4(),
            token: token.to_string(),
            name: device_name_from_user_agent(user_agent).to_string(),
            ip: ip.to_string(),
            user_agent: user_agent.to_string(),
            first_seen: now,
            last_seen: now,
        };
        info!(
            "Device connected: {} from {} (token {})",
            session.name,
            session.ip,
            truncate_token(token)
        );
        sessions.insert(token.to_string(), session);
        TouchOutcome::Connected
    }

    /// Remove the session for `token`, returning it if one existed
    pub fn remove(&self, token: &str) -> Option<DeviceSession> {
        let removed = self.write().remove(token);
        if let Some(session) = &removed {
            info!("Device disconnected: {} from {}", session.name, session.ip);
        }
        removed
    }

    /// Drop sessions idle longer than the inactivity threshold
    pub fn reap_inactive(&self) -> usize {
        let cutoff = self.clock.now() - self.inactivity;
        let mut sessions = self.write();
        let before = sessions.len();
        sessions.retain(|_, session| {
            let keep = session.last_seen >= cutoff;
            if !keep {
                info!(
                    "Device timed out: {} from {} (last seen {})",
                    session.name,
                    session.ip,
                    session.last_seen.to_rfc3339()
                );
            }
            keep
        });
        before - sessions.len()
    }

    /// Copy of all sessions, oldest first
    pub fn list(&self) -> Vec<DeviceSession> {
        let mut devices: Vec<DeviceSession> = self.read().values().cloned().collect();
        devices.sort_by_key(|device| device.first_seen);
        devices
    }

    pub fn count(&self) -> usize {
        self.read().len()
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, DeviceSession>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, DeviceSession>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bma_common::time::ManualClock;

    fn tracker() -> (Arc<ManualClock>, DeviceTracker) {
        let clock = Arc::new(ManualClock::starting_now());
        let tracker = DeviceTracker::new(clock.clone(), Duration::minutes(10));
        (clock, tracker)
    }

    #[test]
    fn test_touch_upserts_single_session() {
        let (clock, tracker) = tracker();
        let start = clock.now();

        assert_eq!(
            tracker.touch("tok", "10.0.0.2", "BMA/2.1 okhttp/4.12.0"),
            TouchOutcome::Connected
        );
        clock.advance(Duration::minutes(3));
        assert_eq!(
            tracker.touch("tok", "10.0.0.9", "BMA/2.1 okhttp/4.12.0"),
            TouchOutcome::Refreshed
        );

        let devices = tracker.list();
        assert_eq!(devices.len(), 1);
        let device = &devices[0];
        assert_eq!(device.first_seen, start);
        assert_eq!(device.last_seen, start + Duration::minutes(3));
        assert_eq!(device.ip, "10.0.0.9");
        assert_eq!(device.name, "BMA App");
    }

    #[test]
    fn test_reap_inactive() {
        let (clock, tracker) = tracker();
        tracker.touch("old", "10.0.0.2", "iPhone");
        clock.advance(Duration::minutes(8));
        tracker.touch("fresh", "10.0.0.3", "iPad");
        clock.advance(Duration::minutes(3));

        assert_eq!(tracker.reap_inactive(), 1);
        let devices = tracker.list();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].token, "fresh");
    }

    #[test]
    fn test_remove() {
        let (_clock, tracker) = tracker();
        tracker.touch("tok", "10.0.0.2", "");

        let removed = tracker.remove("tok").unwrap();
        assert_eq!(removed.name, "Unknown Device");
        assert!(tracker.remove("tok").is_none());
        assert_eq!(tracker.count(), 0);
    }

    #[test]
    fn test_serialized_session_hides_token() {
        let (_clock, tracker) = tracker();
        tracker.touch("secret-token", "10.0.0.2", "Mac");

        let value = serde_json::to_value(&tracker.list()[0]).unwrap();
        assert!(value.get("token").is_none());
        assert_eq!(value["name"], "Mac");
        assert!(value.get("userAgent").is_some());
    }
}
