//! Generates, rotates, and revokes the symmetric AES-256 keys that encrypt
//! capability tokens. Tracks a `(current, optional previous)` pair with a
//! deadline-based grace-period timer, mirroring the current/previous-with-
//! overlap shape of a JWT key-rotation manager but firing on an exact
//! deadline rather than polling an interval.

use std::sync::Arc;
use std::time::Duration;

use rand::RngCore;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use zeroize::Zeroize;

use vaultkeeper_core::error::{Error, Result};

/// A single AES-256 key, owned exclusively by `KeyManager`.
pub struct KeyMaterial {
    pub id: String,
    bytes: [u8; 32],
    pub created_at: i64,
}

impl KeyMaterial {
    fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let created_at = now_seconds();
        let id = format!("k-{}-{}", now_millis(), hex::encode(&rand_suffix()));
        KeyMaterial {
            id,
            bytes,
            created_at,
        }
    }

    pub fn bytes(&self) -> &[u8; 32] {
        &self.bytes
    }
}

impl Clone for KeyMaterial {
    fn clone(&self) -> Self {
        KeyMaterial {
            id: self.id.clone(),
            bytes: self.bytes,
            created_at: self.created_at,
        }
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("id", &self.id)
            .field("bytes", &"<redacted>")
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl Drop for KeyMaterial {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

fn rand_suffix() -> [u8; 4] {
    let mut buf = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut buf);
    buf
}

fn now_seconds() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

fn now_millis() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

struct KeyState {
    current: Option<KeyMaterial>,
    previous: Option<KeyMaterial>,
    rotating: bool,
    /// Monotonically increasing token so a stale grace-period task can
    /// detect that a newer rotation (or a revoke) already superseded it.
    epoch: u64,
}

/// Owns the current and, during a grace period, the previous signing key.
///
/// Readers (`current_key`, `previous_key`, `find`) take a read lock and
/// always observe one consistent snapshot — there is no moment where
/// `current` has advanced but `previous` has not yet been populated, since
/// both fields are swapped together under a single write-lock critical
/// section.
pub struct KeyManager {
    state: Arc<RwLock<KeyState>>,
    grace_task: Arc<RwLock<Option<tokio::task::JoinHandle<()>>>>,
}

impl Default for KeyManager {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyManager {
    pub fn new() -> Self {
        KeyManager {
            state: Arc::new(RwLock::new(KeyState {
                current: None,
                previous: None,
                rotating: false,
                epoch: 0,
            })),
            grace_task: Arc::new(RwLock::new(None)),
        }
    }

    /// Idempotent. Generates a `current` key if none exists yet.
    pub async fn init(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if state.current.is_none() {
            let key = KeyMaterial::generate();
            info!(kid = %key.id, "generated initial key");
            state.current = Some(key);
        }
        Ok(())
    }

    pub async fn current_key(&self) -> Result<KeyMaterial> {
        let state = self.state.read().await;
        state
            .current
            .as_ref()
            .cloned()
            .ok_or(Error::NotInitialized)
    }

    pub async fn previous_key(&self) -> Option<KeyMaterial> {
        let state = self.state.read().await;
        state.previous.as_ref().cloned()
    }

    /// Returns the key identified by `kid`, checking `current` then
    /// `previous`. Returns `None` once the grace period has ended and the
    /// previous key has been cleared.
    pub async fn find(&self, kid: &str) -> Option<KeyMaterial> {
        let state = self.state.read().await;
        if let Some(ref current) = state.current {
            if current.id == kid {
                return Some(current.clone());
            }
        }
        if let Some(ref previous) = state.previous {
            if previous.id == kid {
                return Some(previous.clone());
            }
        }
        None
    }

    pub async fn in_grace_period(&self) -> bool {
        let state = self.state.read().await;
        state.rotating
    }

    /// Promotes `current` to `previous`, generates a new `current`, and
    /// schedules a deadline-based clear of `previous` after
    /// `grace_period`. Fails `RotationInProgress` if a rotation is already
    /// underway.
    pub async fn rotate(&self, grace_period: Duration) -> Result<()> {
        let new_epoch = {
            let mut state = self.state.write().await;
            if state.rotating {
                return Err(Error::RotationInProgress);
            }
            let old_current = state.current.take();
            let new_current = KeyMaterial::generate();
            info!(
                new_kid = %new_current.id,
                old_kid = old_current.as_ref().map(|k| k.id.as_str()).unwrap_or("none"),
                "rotating key"
            );
            state.previous = old_current;
            state.current = Some(new_current);
            state.rotating = true;
            state.epoch += 1;
            state.epoch
        };

        let state = Arc::clone(&self.state);
        let deadline = Instant::now() + grace_period;
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let mut state = state.write().await;
            if state.epoch == new_epoch && state.rotating {
                debug!("grace period elapsed, clearing previous key");
                state.previous = None;
                state.rotating = false;
            }
        });

        *self.grace_task.write().await = Some(handle);
        Ok(())
    }

    /// Immediately clears `previous`, cancels any scheduled grace-period
    /// clear, and generates a fresh `current`. Always succeeds; tokens
    /// encrypted under the destroyed keys become permanently unreadable.
    pub async fn revoke(&self) -> Result<()> {
        if let Some(handle) = self.grace_task.write().await.take() {
            handle.abort();
        }
        let mut state = self.state.write().await;
        warn!(
            kid = state.current.as_ref().map(|k| k.id.as_str()).unwrap_or("none"),
            "revoking key"
        );
        state.previous = None;
        state.current = Some(KeyMaterial::generate());
        state.rotating = false;
        state.epoch += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn init_is_idempotent() {
        let manager = KeyManager::new();
        manager.init().await.unwrap();
        let first = manager.current_key().await.unwrap();
        manager.init().await.unwrap();
        let second = manager.current_key().await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn uninitialized_key_access_fails() {
        let manager = KeyManager::new();
        let err = manager.current_key().await.unwrap_err();
        assert!(matches!(err, Error::NotInitialized));
    }

    #[tokio::test]
    async fn rotate_preserves_previous_during_grace_period() {
        let manager = KeyManager::new();
        manager.init().await.unwrap();
        let old = manager.current_key().await.unwrap();
        manager.rotate(Duration::from_secs(60)).await.unwrap();
        let new = manager.current_key().await.unwrap();
        assert_ne!(old.id, new.id);
        assert!(manager.in_grace_period().await);
        let found = manager.find(&old.id).await;
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn rotate_while_rotating_fails() {
        let manager = KeyManager::new();
        manager.init().await.unwrap();
        manager.rotate(Duration::from_secs(60)).await.unwrap();
        let err = manager.rotate(Duration::from_secs(60)).await.unwrap_err();
        assert!(matches!(err, Error::RotationInProgress));
    }

    #[tokio::test]
    async fn grace_period_expires_after_deadline() {
        let manager = KeyManager::new();
        manager.init().await.unwrap();
        let old = manager.current_key().await.unwrap();
        manager.rotate(Duration::from_millis(20)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!manager.in_grace_period().await);
        assert!(manager.find(&old.id).await.is_none());
    }

    #[tokio::test]
    async fn revoke_clears_previous_and_cancels_grace_timer() {
        let manager = KeyManager::new();
        manager.init().await.unwrap();
        let old = manager.current_key().await.unwrap();
        manager.rotate(Duration::from_secs(60)).await.unwrap();
        manager.revoke().await.unwrap();
        assert!(!manager.in_grace_period().await);
        assert!(manager.find(&old.id).await.is_none());
    }
}
