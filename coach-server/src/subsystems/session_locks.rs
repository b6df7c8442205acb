//! Per-session mutual exclusion for `/analyze`.
//!
//! Two recordings for the same session must not interleave their
//! read-history / append-turns sequence. Different sessions never block
//! each other. Entries are dropped once the last holder releases them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = HashMap<String, Arc<AsyncMutex<()>>>;

#[derive(Clone, Default)]
pub struct SessionLocks {
    inner: Arc<Mutex<LockMap>>,
}

/// Held for the duration of one analysis.
pub struct SessionGuard {
    session_id: String,
    locks: Arc<Mutex<LockMap>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, session_id: &str) -> SessionGuard {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            map.entry(session_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        let guard = lock.lock_owned().await;
        SessionGuard {
            session_id: session_id.to_string(),
            locks: self.inner.clone(),
            guard: Some(guard),
        }
    }

    /// Number of sessions with a live lock entry.
    pub fn active(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let mut map = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        self.guard.take();
        // Only the map still references the mutex: nobody holds or waits on it.
        if let Some(lock) = map.get(&self.session_id) {
            if Arc::strong_count(lock) == 1 {
                map.remove(&self.session_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    // ========================================================================
    // TEST 1: same session is serialized
    // ========================================================================
    #[tokio::test]
    async fn test_same_session_serialized() {
        let locks = SessionLocks::new();
        let in_flight = Arc::new(AtomicU32::new(0));
        let max_seen = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let locks = locks.clone();
            let in_flight = in_flight.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire("s1").await;
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(locks.active(), 0);
    }

    // ========================================================================
    // TEST 2: different sessions do not block each other
    // ========================================================================
    #[tokio::test]
    async fn test_different_sessions_independent() {
        let locks = SessionLocks::new();
        let _a = locks.acquire("a").await;

        let b = tokio::time::timeout(Duration::from_millis(200), locks.acquire("b")).await;
        assert!(b.is_ok());
        assert_eq!(locks.active(), 2);
    }

    // ========================================================================
    // TEST 3: entry removed after release
    // ========================================================================
    #[tokio::test]
    async fn test_entry_pruned_on_release() {
        let locks = SessionLocks::new();
        {
            let _guard = locks.acquire("s1").await;
            assert_eq!(locks.active(), 1);
        }
        assert_eq!(locks.active(), 0);
    }
}
