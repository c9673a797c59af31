//! Tagged failure taxonomy shared across every Vaultkeeper crate.
//!
//! One variant per failure kind named in the error handling design; no
//! generic "other" bucket. Callers match on kind, not on message text.

use thiserror::Error;

/// The complete set of ways a Vaultkeeper operation can fail.
#[derive(Debug, Error)]
pub enum Error {
    #[error("key manager used before init")]
    NotInitialized,

    #[error("no enabled backend available: {reason} (attempted: {attempted:?})")]
    BackendUnavailable {
        reason: String,
        attempted: Vec<String>,
    },

    #[error("secret not found: {id}")]
    SecretNotFound { id: String },

    #[error("token expired")]
    TokenExpired { can_refresh: bool },

    #[error("token revoked")]
    TokenRevoked,

    #[error("usage limit exceeded")]
    UsageLimitExceeded,

    #[error("key revoked or unknown: {kid}")]
    KeyRevoked { kid: String },

    /// Reserved for future use; never emitted today.
    #[error("key rotated")]
    KeyRotated,

    #[error("decryption failed")]
    DecryptionFailed,

    #[error("malformed token: {reason}")]
    MalformedToken { reason: String },

    #[error("malformed claims: {reason}")]
    MalformedClaims { reason: String },

    #[error("identity mismatch: previous={previous} current={current}")]
    IdentityMismatch { previous: String, current: String },

    #[error("rotation already in progress")]
    RotationInProgress,

    #[error("capability token not issued by this orchestrator")]
    AuthorizationDenied,

    #[error("invalid algorithm {requested}, allowed: {allowed:?}")]
    InvalidAlgorithm {
        requested: String,
        allowed: Vec<String>,
    },

    #[error("filesystem error at {path}: {message} (needs permission {required_permission})")]
    Filesystem {
        path: String,
        message: String,
        required_permission: String,
    },

    #[error("setup failed: missing or incompatible dependency {dependency}")]
    Setup { dependency: String },

    /// Single-use accessor consumed a second time, or any access attempted
    /// after the first `read` completed. Distinct from `AuthorizationDenied`
    /// because the handle itself is still valid — only the accessor is dead.
    #[error("accessor already consumed")]
    AlreadyConsumed,

    /// The underlying process failed to spawn (not merely exited non-zero).
    #[error("failed to spawn process: {message}")]
    ExecFailed { message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
