//! Module-private claims store keyed by a generational arena handle.
//! Handles not created by this store — or an index whose generation has
//! moved on — yield no claims, which is what defeats forgery.

use tokio::sync::RwLock;
use vaultkeeper_core::claims::Claims;

/// An opaque reference into a `ClaimsStore`. Carries no claim data itself
/// (only an index and a generation counter), so no public conversion of a
/// handle can leak a claim value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityHandle {
    index: usize,
    generation: u64,
}

struct Slot {
    generation: u64,
    claims: Claims,
}

/// Entries live for the process lifetime; the core specifies no eviction
/// (usage limits and expiry bound the claim's useful life, not the arena).
pub struct ClaimsStore {
    slots: RwLock<Vec<Slot>>,
}

impl Default for ClaimsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ClaimsStore {
    pub fn new() -> Self {
        ClaimsStore {
            slots: RwLock::new(Vec::new()),
        }
    }

    pub async fn insert(&self, claims: Claims) -> CapabilityHandle {
        let mut slots = self.slots.write().await;
        let index = slots.len();
        let generation = 1;
        slots.push(Slot { generation, claims });
        CapabilityHandle { index, generation }
    }

    pub async fn get(&self, handle: CapabilityHandle) -> Option<Claims> {
        let slots = self.slots.read().await;
        slots.get(handle.index).and_then(|slot| {
            if slot.generation == handle.generation {
                Some(slot.claims.clone())
            } else {
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultkeeper_core::claims::UsageLimit;

    fn sample() -> Claims {
        Claims {
            jti: "jti-1".to_string(),
            iat: 0,
            exp: 1,
            sub: "s".to_string(),
            exe: "dev".to_string(),
            usage_limit: UsageLimit::Unlimited,
            tid: 3,
            bkd: "memory".to_string(),
            val: "v".to_string(),
            reference: "s".to_string(),
        }
    }

    #[tokio::test]
    async fn insert_then_get_succeeds() {
        let store = ClaimsStore::new();
        let handle = store.insert(sample()).await;
        let claims = store.get(handle).await.unwrap();
        assert_eq!(claims.jti, "jti-1");
    }

    #[tokio::test]
    async fn foreign_handle_yields_nothing() {
        let store = ClaimsStore::new();
        store.insert(sample()).await;
        let forged = CapabilityHandle {
            index: 99,
            generation: 1,
        };
        assert!(store.get(forged).await.is_none());
    }

    #[tokio::test]
    async fn wrong_generation_yields_nothing() {
        let store = ClaimsStore::new();
        let handle = store.insert(sample()).await;
        let forged = CapabilityHandle {
            index: handle.index,
            generation: handle.generation + 1,
        };
        assert!(store.get(forged).await.is_none());
    }
}
