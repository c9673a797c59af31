//! Bounded FIFO-evicting set of revoked token ids.

use std::collections::{HashSet, VecDeque};

use tokio::sync::RwLock;

const DEFAULT_CAPACITY: usize = 10_000;

struct Inner {
    cap: usize,
    order: VecDeque<String>,
    set: HashSet<String>,
}

/// Process-local, insertion-ordered set of blocklisted `jti`s. At
/// capacity, inserting a new id evicts the oldest. Re-inserting an id
/// already present refreshes its recency position.
pub struct Blocklist {
    inner: RwLock<Inner>,
}

impl Default for Blocklist {
    fn default() -> Self {
        Self::new()
    }
}

impl Blocklist {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(cap: usize) -> Self {
        Blocklist {
            inner: RwLock::new(Inner {
                cap,
                order: VecDeque::new(),
                set: HashSet::new(),
            }),
        }
    }

    pub async fn contains(&self, jti: &str) -> bool {
        self.inner.read().await.set.contains(jti)
    }

    pub async fn insert(&self, jti: String) {
        let mut inner = self.inner.write().await;
        if inner.set.contains(&jti) {
            inner.order.retain(|existing| existing != &jti);
            inner.order.push_back(jti);
            return;
        }
        if inner.order.len() >= inner.cap {
            if let Some(oldest) = inner.order.pop_front() {
                inner.set.remove(&oldest);
            }
        }
        inner.order.push_back(jti.clone());
        inner.set.insert(jti);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_and_contains() {
        let blocklist = Blocklist::new();
        assert!(!blocklist.contains("jti-1").await);
        blocklist.insert("jti-1".to_string()).await;
        assert!(blocklist.contains("jti-1").await);
    }

    #[tokio::test]
    async fn evicts_oldest_at_capacity() {
        let blocklist = Blocklist::with_capacity(3);
        blocklist.insert("a".to_string()).await;
        blocklist.insert("b".to_string()).await;
        blocklist.insert("c".to_string()).await;
        blocklist.insert("d".to_string()).await;

        assert!(!blocklist.contains("a").await);
        assert!(blocklist.contains("b").await);
        assert!(blocklist.contains("c").await);
        assert!(blocklist.contains("d").await);
    }

    #[tokio::test]
    async fn reinsert_refreshes_recency() {
        let blocklist = Blocklist::with_capacity(3);
        blocklist.insert("a".to_string()).await;
        blocklist.insert("b".to_string()).await;
        blocklist.insert("c".to_string()).await;
        blocklist.insert("a".to_string()).await;
        blocklist.insert("d".to_string()).await;

        // b was least-recently-inserted after a's refresh, so it is evicted.
        assert!(blocklist.contains("a").await);
        assert!(!blocklist.contains("b").await);
        assert!(blocklist.contains("c").await);
        assert!(blocklist.contains("d").await);
    }

    #[tokio::test]
    async fn large_scale_eviction_keeps_most_recent() {
        let cap = 100;
        let blocklist = Blocklist::with_capacity(cap);
        for i in 0..250 {
            blocklist.insert(format!("jti-{i}")).await;
        }
        let mut present = 0;
        for i in 0..250 {
            if blocklist.contains(&format!("jti-{i}")).await {
                present += 1;
            }
        }
        assert!(present <= cap);
        for i in 150..250 {
            assert!(blocklist.contains(&format!("jti-{i}")).await);
        }
    }
}
