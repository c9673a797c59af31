#![forbid(unsafe_code)]

//! `vaultkeeper-crypto` — the symmetric key manager and token codec that
//! give Vaultkeeper tokens their confidentiality and integrity guarantees.

pub mod key_manager;
pub mod token_codec;

pub mod prelude {
    pub use crate::key_manager::{KeyManager, KeyMaterial};
    pub use crate::token_codec::{decrypt, encrypt, extract_kid};
}

pub use prelude::*;
