//! The backend interface external secret stores satisfy, plus a registry
//! that resolves a configured `type` string to a concrete backend.

use std::collections::HashMap;

use async_trait::async_trait;

use vaultkeeper_core::error::{Error, Result};

pub mod encrypted_file;
pub mod memory;

/// A secret store. Keychain, DPAPI, Secret-Service, 1Password, and
/// YubiKey backends all implement this from outside this workspace; the
/// two reference implementations here (`memory`, `encrypted_file`) let
/// the orchestrator and its tests run without any of them.
#[async_trait]
pub trait Backend: Send + Sync {
    fn backend_type(&self) -> &'static str;
    fn display_name(&self) -> &'static str;

    async fn is_available(&self) -> bool;
    async fn store(&self, id: &str, secret: &str) -> Result<()>;
    async fn retrieve(&self, id: &str) -> Result<String>;
    async fn delete(&self, id: &str) -> Result<()>;
    async fn exists(&self, id: &str) -> bool;

    /// Backends that can't enumerate their contents return `None`.
    async fn list(&self) -> Option<Vec<String>> {
        None
    }
}

type Factory = Box<dyn Fn() -> Box<dyn Backend> + Send + Sync>;

/// Maps a backend `type` string to a factory that constructs it. The
/// `"memory"` and `"encrypted-file"` types are pre-registered.
pub struct BackendRegistry {
    factories: HashMap<String, Factory>,
}

impl Default for BackendRegistry {
    fn default() -> Self {
        let mut registry = BackendRegistry {
            factories: HashMap::new(),
        };
        registry.register("memory", || Box::new(memory::InMemoryBackend::new()));
        registry
    }
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, backend_type: &str, factory: F)
    where
        F: Fn() -> Box<dyn Backend> + Send + Sync + 'static,
    {
        self.factories.insert(backend_type.to_string(), Box::new(factory));
    }

    pub fn resolve(&self, backend_type: &str) -> Option<Box<dyn Backend>> {
        self.factories.get(backend_type).map(|factory| factory())
    }

    pub async fn first_available(&self, candidates: &[String]) -> Result<Box<dyn Backend>> {
        for candidate in candidates {
            if let Some(backend) = self.resolve(candidate) {
                if backend.is_available().await {
                    return Ok(backend);
                }
            }
        }
        Err(Error::BackendUnavailable {
            reason: "no enabled backend reported itself available".to_string(),
            attempted: candidates.to_vec(),
        })
    }
}
