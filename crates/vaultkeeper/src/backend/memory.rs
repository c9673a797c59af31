//! In-memory reference backend, used for tests and `--dev` mode. Secrets
//! do not survive process restart.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use vaultkeeper_core::error::{Error, Result};

use super::Backend;

pub struct InMemoryBackend {
    store: RwLock<HashMap<String, String>>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        InMemoryBackend {
            store: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    fn backend_type(&self) -> &'static str {
        "memory"
    }

    fn display_name(&self) -> &'static str {
        "In-memory (non-persistent)"
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn store(&self, id: &str, secret: &str) -> Result<()> {
        self.store.write().await.insert(id.to_string(), secret.to_string());
        Ok(())
    }

    async fn retrieve(&self, id: &str) -> Result<String> {
        self.store
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| Error::SecretNotFound { id: id.to_string() })
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.store
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Error::SecretNotFound { id: id.to_string() })
    }

    async fn exists(&self, id: &str) -> bool {
        self.store.read().await.contains_key(id)
    }

    async fn list(&self) -> Option<Vec<String>> {
        Some(self.store.read().await.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_then_retrieve() {
        let backend = InMemoryBackend::new();
        backend.store("api-key", "sk-live-abc").await.unwrap();
        assert_eq!(backend.retrieve("api-key").await.unwrap(), "sk-live-abc");
    }

    #[tokio::test]
    async fn retrieve_missing_fails() {
        let backend = InMemoryBackend::new();
        let err = backend.retrieve("nope").await.unwrap_err();
        assert!(matches!(err, Error::SecretNotFound { .. }));
    }

    #[tokio::test]
    async fn delete_missing_fails() {
        let backend = InMemoryBackend::new();
        let err = backend.delete("nope").await.unwrap_err();
        assert!(matches!(err, Error::SecretNotFound { .. }));
    }

    #[tokio::test]
    async fn list_reflects_stored_entries() {
        let backend = InMemoryBackend::new();
        backend.store("a", "1").await.unwrap();
        backend.store("b", "2").await.unwrap();
        let mut listed = backend.list().await.unwrap();
        listed.sort();
        assert_eq!(listed, vec!["a".to_string(), "b".to_string()]);
    }
}
