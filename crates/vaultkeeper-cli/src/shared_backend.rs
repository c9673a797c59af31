//! Adapts a single, already-constructed backend instance into the
//! `BackendRegistry`'s synchronous factory shape. Needed because backends
//! like `EncryptedFileBackend` open asynchronously (reading/creating a
//! key file) while the registry's factory signature is sync.

use std::sync::Arc;

use async_trait::async_trait;
use vaultkeeper::backend::Backend;
use vaultkeeper_core::error::Result;

pub struct SharedBackend(pub Arc<Box<dyn Backend>>);

#[async_trait]
impl Backend for SharedBackend {
    fn backend_type(&self) -> &'static str {
        self.0.backend_type()
    }

    fn display_name(&self) -> &'static str {
        self.0.display_name()
    }

    async fn is_available(&self) -> bool {
        self.0.is_available().await
    }

    async fn store(&self, id: &str, secret: &str) -> Result<()> {
        self.0.store(id, secret).await
    }

    async fn retrieve(&self, id: &str) -> Result<String> {
        self.0.retrieve(id).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.0.delete(id).await
    }

    async fn exists(&self, id: &str) -> bool {
        self.0.exists(id).await
    }

    async fn list(&self) -> Option<Vec<String>> {
        self.0.list().await
    }
}
