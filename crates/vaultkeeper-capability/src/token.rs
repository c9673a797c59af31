//! `CapabilityToken` — the opaque handle returned by `authorize`, granting
//! one operation against the claims store that minted it.

use std::sync::Arc;

use vaultkeeper_core::claims::Claims;
use vaultkeeper_core::error::{Error, Result};

use crate::store::{CapabilityHandle, ClaimsStore};

/// Opaque capability. Exposes no claim data through `Debug` or any other
/// public conversion — only the delegated operations in
/// `vaultkeeper-ops` may recover the underlying claims, and only by
/// calling `claims()`.
#[derive(Clone)]
pub struct CapabilityToken {
    handle: CapabilityHandle,
    store: Arc<ClaimsStore>,
}

impl CapabilityToken {
    /// Constructs a token from a handle already present in `store`. Called
    /// by the orchestrator right after `ClaimsStore::insert`; not meant to
    /// be used to wrap handles from elsewhere.
    pub fn new(handle: CapabilityHandle, store: Arc<ClaimsStore>) -> Self {
        CapabilityToken { handle, store }
    }

    /// Resolves the underlying claims. Fails `AuthorizationDenied` if this
    /// token's handle is foreign to `store` (forged or stale).
    pub async fn claims(&self) -> Result<Claims> {
        self.store
            .get(self.handle)
            .await
            .ok_or(Error::AuthorizationDenied)
    }
}

impl std::fmt::Debug for CapabilityToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityToken")
            .field("handle", &"<opaque>")
            .finish()
    }
}
