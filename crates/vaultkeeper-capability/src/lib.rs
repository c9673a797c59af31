#![forbid(unsafe_code)]

//! `vaultkeeper-capability` — the capability token itself: its
//! process-private claims store, the usage/expiry/blocklist validator,
//! and the single-use secret accessor.

pub mod accessor;
pub mod blocklist;
pub mod store;
pub mod token;
pub mod validator;

pub mod prelude {
    pub use crate::accessor::SingleUseAccessor;
    pub use crate::blocklist::Blocklist;
    pub use crate::store::{CapabilityHandle, ClaimsStore};
    pub use crate::token::CapabilityToken;
    pub use crate::validator::validate;
}

pub use prelude::*;
