//! Session storage keyed by user id.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{TimeDelta, Utc};

use crate::collector::session::CalcSession;

/// Storage for in-flight calculations.
///
/// Implementations must keep users isolated from each other. Ordering of
/// calls for a single user is the caller's responsibility.
pub trait SessionStore: Send + Sync {
    /// Snapshot of the user's session, if any.
    fn get(&self, user_id: &str) -> Option<CalcSession>;

    /// Create or replace the user's session.
    fn set(&self, user_id: &str, session: CalcSession);

    /// Drop the user's session. Returns whether one existed.
    fn clear(&self, user_id: &str) -> bool;
}

/// Process-local session store.
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, CalcSession>>,
}

impl InMemorySessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Number of sessions currently held.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Remove sessions that have been idle for longer than the given duration.
    ///
    /// Returns the number of sessions pruned.
    pub fn prune_stale(&self, max_idle: Duration) -> usize {
        let max_idle = TimeDelta::from_std(max_idle).unwrap_or(TimeDelta::MAX);
        let cutoff = Utc::now()
            .checked_sub_signed(max_idle)
            .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);

        let count = {
            let mut sessions = self.write();
            let before = sessions.len();
            sessions.retain(|_, session| session.last_active_at >= cutoff);
            before - sessions.len()
        };

        if count > 0 {
            tracing::info!(
                "Pruned {} stale session(s) (idle > {}s)",
                count,
                max_idle.num_seconds()
            );
        }

        count
    }

    // Poisoning is ignored: writers only insert or remove whole sessions.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, CalcSession>> {
        self.sessions.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, CalcSession>> {
        self.sessions.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, user_id: &str) -> Option<CalcSession> {
        self.read().get(user_id).cloned()
    }

    fn set(&self, user_id: &str, session: CalcSession) {
        self.write().insert(user_id.to_string(), session);
    }

    fn clear(&self, user_id: &str) -> bool {
        self.write().remove(user_id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_clear() {
        let store = InMemorySessionStore::new();
        assert!(store.get("user-1").is_none());

        store.set("user-1", CalcSession::new());
        assert!(store.get("user-1").is_some());
        assert_eq!(store.len(), 1);

        assert!(store.clear("user-1"));
        assert!(!store.clear("user-1"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_users_are_isolated() {
        let store = InMemorySessionStore::new();
        store.set("user-1", CalcSession::new());

        assert!(store.get("user-2").is_none());
        store.clear("user-2");
        assert!(store.get("user-1").is_some());
    }

    #[test]
    fn test_prune_stale_sessions() {
        let store = InMemorySessionStore::new();

        let mut stale = CalcSession::new();
        stale.last_active_at = Utc::now() - TimeDelta::hours(2);
        store.set("stale", stale);
        store.set("fresh", CalcSession::new());

        let pruned = store.prune_stale(Duration::from_secs(3600));
        assert_eq!(pruned, 1);
        assert!(store.get("stale").is_none());
        assert!(store.get("fresh").is_some());
    }

    #[test]
    fn test_prune_with_huge_idle_keeps_everything() {
        let store = InMemorySessionStore::new();
        store.set("user-1", CalcSession::new());

        assert_eq!(store.prune_stale(Duration::MAX), 0);
        assert_eq!(store.len(), 1);
    }
}
