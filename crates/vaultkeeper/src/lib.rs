//! The orchestrator crate: wires the key manager, codec, trust manifest,
//! capability store, and delegated operations from the lower crates
//! into the single `Vault` surface applications embed.

#![forbid(unsafe_code)]

pub mod backend;
pub mod config;
pub mod vault;

pub mod prelude {
    pub use crate::backend::{Backend, BackendRegistry};
    pub use crate::config::Config;
    pub use crate::vault::{AuthorizeResult, KeyStatus, SetupOptions, Vault};
    pub use vaultkeeper_core::error::{Error, Result};
}

pub use prelude::*;
