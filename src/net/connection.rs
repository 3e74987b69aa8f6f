//! Bridge connection tracking.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Cap concurrent bridge connections
//! - Keep a live registry of sessions (base path, state, exchange count)
//! - Release the slot and registry entry when a connection ends

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::bridge::session::SessionState;
use crate::observability::metrics;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Registry entry for one live session.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub id: ConnectionId,
    pub base_path: String,
    pub state: SessionState,
    pub exchanges: u64,
    pub opened_at: Instant,
}

/// Tracks live bridge connections.
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    active_count: Arc<AtomicU64>,
    limit: Arc<Semaphore>,
    max_connections: usize,
    sessions: Arc<DashMap<ConnectionId, SessionInfo>>,
}

impl ConnectionTracker {
    pub fn new(max_connections: usize) -> Self {
        Self {
            active_count: Arc::new(AtomicU64::new(0)),
            limit: Arc::new(Semaphore::new(max_connections)),
            max_connections,
            sessions: Arc::new(DashMap::new()),
        }
    }

    /// Record a new connection bound to `base_path`.
    ///
    /// Returns `None` when the connection cap is reached. The returned guard
    /// releases the slot when dropped.
    pub fn try_track(&self, base_path: &str) -> Option<ConnectionGuard> {
        let permit = self.limit.clone().try_acquire_owned().ok()?;
        let id = ConnectionId::new();
        self.sessions.insert(
            id,
            SessionInfo {
                id,
                base_path: base_path.to_string(),
                state: SessionState::Idle,
                exchanges: 0,
                opened_at: Instant::now(),
            },
        );
        let active = self.active_count.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::record_connection_opened(active);

        Some(ConnectionGuard {
            id,
            active_count: Arc::clone(&self.active_count),
            sessions: Arc::clone(&self.sessions),
            _permit: permit,
        })
    }

    /// Get current active connection count.
    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Snapshot of live sessions ordered by connection ID.
    pub fn sessions(&self) -> Vec<SessionInfo> {
        let mut sessions: Vec<_> = self.sessions.iter().map(|e| e.value().clone()).collect();
        sessions.sort_by_key(|s| s.id);
        sessions
    }

    /// Wait until all connections are closed or `timeout` elapses.
    /// Returns true if the tracker drained.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.active_count() > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        true
    }
}

/// Guard that tracks a connection's lifetime.
/// Decrements active count and drops the registry entry when dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    id: ConnectionId,
    active_count: Arc<AtomicU64>,
    sessions: Arc<DashMap<ConnectionId, SessionInfo>>,
    _permit: OwnedSemaphorePermit,
}

impl ConnectionGuard {
    /// Get this connection's ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn record_state(&self, state: SessionState) {
        if let Some(mut entry) = self.sessions.get_mut(&self.id) {
            entry.state = state;
        }
    }

    pub fn record_exchange(&self) {
        if let Some(mut entry) = self.sessions.get_mut(&self.id) {
            entry.exchanges += 1;
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.sessions.remove(&self.id);
        let active = self.active_count.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::record_connection_closed(active);
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
        assert!(id1.to_string().starts_with("conn-"));
    }

    #[test]
    fn connection_tracker_counts() {
        let tracker = ConnectionTracker::new(10);
        assert_eq!(tracker.active_count(), 0);

        let guard1 = tracker.try_track("/a").unwrap();
        assert_eq!(tracker.active_count(), 1);

        let guard2 = tracker.try_track("/b").unwrap();
        assert_eq!(tracker.active_count(), 2);
        assert_eq!(tracker.sessions().len(), 2);

        drop(guard1);
        assert_eq!(tracker.active_count(), 1);
        assert_eq!(tracker.sessions()[0].base_path, "/b");

        drop(guard2);
        assert_eq!(tracker.active_count(), 0);
        assert!(tracker.sessions().is_empty());
    }

    #[test]
    fn connection_tracker_enforces_cap() {
        let tracker = ConnectionTracker::new(1);
        let guard = tracker.try_track("/a").unwrap();
        assert!(tracker.try_track("/a").is_none());
        drop(guard);
        assert!(tracker.try_track("/a").is_some());
    }

    #[test]
    fn guard_updates_registry() {
        let tracker = ConnectionTracker::new(1);
        let guard = tracker.try_track("/a").unwrap();
        guard.record_state(SessionState::Dispatched);
        guard.record_exchange();
        let info = &tracker.sessions()[0];
        assert_eq!(info.state, SessionState::Dispatched);
        assert_eq!(info.exchanges, 1);
        assert_eq!(info.id, guard.id());
    }

    #[tokio::test]
    async fn wait_for_drain_times_out_while_connected() {
        let tracker = ConnectionTracker::new(1);
        let guard = tracker.try_track("/a").unwrap();
        assert!(!tracker.wait_for_drain(Duration::from_millis(50)).await);
        drop(guard);
        assert!(tracker.wait_for_drain(Duration::from_millis(50)).await);
    }
}
