#![forbid(unsafe_code)]

//! `vaultkeeper-ops` — the four delegated access patterns. Every
//! operation here accepts a capability token (or, for `verify`, no
//! token at all), looks up the claims it needs, and returns a result
//! that never contains the underlying secret value.

pub mod exec;
pub mod fetch;
pub mod keytype;
pub mod sign;
pub mod substitute;
pub mod verify;

pub mod prelude {
    pub use crate::exec::{delegated_exec, ExecRequest, ExecResult};
    pub use crate::fetch::{delegated_fetch, FetchRequest, FetchResponse};
    pub use crate::sign::{delegated_sign, SignRequest, SignResult};
    pub use crate::substitute::substitute;
    pub use crate::verify::delegated_verify;
}

pub use prelude::*;
