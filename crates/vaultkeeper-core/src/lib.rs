#![forbid(unsafe_code)]

//! `vaultkeeper-core` — shared error taxonomy and data model for the
//! Vaultkeeper capability-token system.
//!
//! This crate has no knowledge of cryptography, trust, or orchestration;
//! it exists so every other Vaultkeeper crate agrees on one `Error` type
//! and one `Claims` shape.

pub mod claims;
pub mod error;
pub mod hash;

pub mod prelude {
    pub use crate::claims::{Claims, TrustTier, UsageLimit};
    pub use crate::error::{Error, Result};
    pub use crate::hash::hash_file;
}

pub use prelude::*;
