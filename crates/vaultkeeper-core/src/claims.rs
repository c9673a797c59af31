//! The authenticated payload carried inside every capability token.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How many times a token may be authorized before it is blocklisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UsageLimit {
    Finite(u64),
    Unlimited,
}

impl UsageLimit {
    pub fn is_exceeded(&self, used_count: u64) -> bool {
        match self {
            UsageLimit::Finite(limit) => *limit == 0 || used_count >= *limit,
            UsageLimit::Unlimited => false,
        }
    }
}

/// Tier 1 (provenance-verified), Tier 2 (manifest-approved), Tier 3
/// (unverified / first use). Never serialized directly — `Claims.tid`
/// carries the raw `u8` on the wire; this is the validated view of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustTier {
    ProvenanceVerified = 1,
    ManifestApproved = 2,
    Unverified = 3,
}

impl TrustTier {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(TrustTier::ProvenanceVerified),
            2 => Some(TrustTier::ManifestApproved),
            3 => Some(TrustTier::Unverified),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

/// The decoded, authenticated contents of a capability token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Unique token id.
    pub jti: String,
    /// Issued-at, seconds since epoch.
    pub iat: i64,
    /// Expiry, seconds since epoch. Always `>= iat`.
    pub exp: i64,
    /// Logical secret name.
    pub sub: String,
    /// Caller identity: 64-hex SHA-256 of the executable, or the literal
    /// `"dev"`.
    pub exe: String,
    #[serde(rename = "use")]
    pub usage_limit: UsageLimit,
    pub tid: u8,
    /// Backend type hint.
    pub bkd: String,
    /// The secret value. The only in-memory location carrying raw
    /// plaintext across the token boundary.
    pub val: String,
    /// Backend-local reference.
    #[serde(rename = "ref")]
    pub reference: String,
}

impl Claims {
    /// Structural validation: required fields present, non-empty, and
    /// internally consistent. Does not check expiry, blocklist, or usage —
    /// those are `ClaimsValidator`'s job.
    pub fn validate_shape(&self) -> Result<()> {
        let non_empty = [
            ("jti", &self.jti),
            ("sub", &self.sub),
            ("exe", &self.exe),
            ("bkd", &self.bkd),
            ("val", &self.val),
            ("ref", &self.reference),
        ];
        for (name, value) in non_empty {
            if value.is_empty() {
                return Err(Error::MalformedClaims {
                    reason: format!("field `{name}` must be non-empty"),
                });
            }
        }
        if self.iat > self.exp {
            return Err(Error::MalformedClaims {
                reason: "iat must be <= exp".to_string(),
            });
        }
        if TrustTier::from_u8(self.tid).is_none() {
            return Err(Error::MalformedClaims {
                reason: format!("tid must be 1, 2, or 3, got {}", self.tid),
            });
        }
        Ok(())
    }

    pub fn trust_tier(&self) -> Option<TrustTier> {
        TrustTier::from_u8(self.tid)
    }
}
