use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::ConnectionHandle;

struct SessionEntry {
    handle: Arc<dyn ConnectionHandle>,
    last_seen: Instant,
}

/// Point-in-time view of one session, taken for heartbeat sweeps.
pub struct SessionSnapshot {
    pub key: String,
    pub handle: Arc<dyn ConnectionHandle>,
    pub last_seen: Instant,
}

/// Registry of live sessions keyed by participant key.
///
/// Exclusively owns the key -> handle mapping and the per-connection
/// liveness timestamps. Internally synchronized; callers never take locks.
/// A handle returned by `lookup` may already be stale when an eviction
/// races the read, so callers re-check `is_open` before sending.
#[derive(Default, Clone)]
pub struct SessionRegistry {
    inner: Arc<RwLock<HashMap<String, SessionEntry>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the mapping for `key`; last write wins.
    pub async fn register(&self, key: String, handle: Arc<dyn ConnectionHandle>) {
        let mut guard = self.inner.write().await;
        guard.insert(
            key,
            SessionEntry {
                handle,
                last_seen: Instant::now(),
            },
        );
    }

    /// Absent means the participant is unknown or already evicted.
    pub async fn lookup(&self, key: &str) -> Option<Arc<dyn ConnectionHandle>> {
        self.inner.read().await.get(key).map(|e| e.handle.clone())
    }

    /// Removes the mapping and its liveness timestamp. No-op when the key
    /// is already absent.
    pub async fn remove(&self, key: &str) {
        self.inner.write().await.remove(key);
    }

    /// Record a liveness response. Unknown keys are ignored.
    pub async fn touch(&self, key: &str) {
        if let Some(entry) = self.inner.write().await.get_mut(key) {
            entry.last_seen = Instant::now();
        }
    }

    /// Point-in-time copy of (key, handle) pairs, safe to iterate while the
    /// map is concurrently mutated.
    pub async fn all_handles(&self) -> Vec<(String, Arc<dyn ConnectionHandle>)> {
        self.inner
            .read()
            .await
            .iter()
            .map(|(key, entry)| (key.clone(), entry.handle.clone()))
            .collect()
    }

    /// Point-in-time copy including liveness timestamps, for the heartbeat
    /// sweep.
    pub async fn snapshot(&self) -> Vec<SessionSnapshot> {
        self.inner
            .read()
            .await
            .iter()
            .map(|(key, entry)| SessionSnapshot {
                key: key.clone(),
                handle: entry.handle.clone(),
                last_seen: entry.last_seen,
            })
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Remove and return every handle. Used on shutdown to close whatever
    /// is still connected.
    pub async fn drain(&self) -> Vec<Arc<dyn ConnectionHandle>> {
        self.inner
            .write()
            .await
            .drain()
            .map(|(_, entry)| entry.handle)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::test_support::MockConnection;

    #[tokio::test]
    async fn register_lookup_remove() {
        let registry = SessionRegistry::new();
        let conn = MockConnection::open();

        registry.register("alice-1".into(), conn.clone()).await;
        assert!(registry.lookup("alice-1").await.is_some());
        assert_eq!(registry.len().await, 1);

        registry.remove("alice-1").await;
        assert!(registry.lookup("alice-1").await.is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn remove_absent_key_is_noop() {
        let registry = SessionRegistry::new();
        registry.remove("nobody").await;
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn register_is_last_write_wins() {
        let registry = SessionRegistry::new();
        let first = MockConnection::open();
        let second = MockConnection::open();

        registry.register("bob-2".into(), first).await;
        registry.register("bob-2".into(), second.clone()).await;

        assert_eq!(registry.len().await, 1);
        let resolved = registry.lookup("bob-2").await.unwrap();
        resolved.send_text("hi".into()).unwrap();
        assert_eq!(second.sent(), vec!["hi".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn touch_updates_last_seen() {
        let registry = SessionRegistry::new();
        registry.register("carol-3".into(), MockConnection::open()).await;

        let before = registry.snapshot().await[0].last_seen;
        tokio::time::advance(std::time::Duration::from_secs(5)).await;
        registry.touch("carol-3").await;
        let after = registry.snapshot().await[0].last_seen;

        assert!(after > before);
        // Unknown keys are ignored rather than inserted.
        registry.touch("nobody").await;
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn all_handles_is_a_snapshot() {
        let registry = SessionRegistry::new();
        registry.register("a".into(), MockConnection::open()).await;
        registry.register("b".into(), MockConnection::open()).await;

        let snapshot = registry.all_handles().await;
        registry.remove("a").await;

        assert_eq!(snapshot.len(), 2);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn drain_empties_the_registry() {
        let registry = SessionRegistry::new();
        registry.register("a".into(), MockConnection::open()).await;
        registry.register("b".into(), MockConnection::open()).await;

        let handles = registry.drain().await;
        assert_eq!(handles.len(), 2);
        assert!(registry.is_empty().await);
    }
}
