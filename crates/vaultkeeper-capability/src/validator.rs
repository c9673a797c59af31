//! Enforces expiry, shape, blocklist membership, and usage budget on
//! decoded claims, in the fixed rule order the orchestrator depends on.

use vaultkeeper_core::claims::Claims;
use vaultkeeper_core::error::{Error, Result};

use crate::blocklist::Blocklist;

/// Validates `claims` against `used_count` and the process-local
/// blocklist. Rule order matters: shape, then expiry, then blocklist,
/// then usage budget.
pub async fn validate(claims: &Claims, used_count: u64, blocklist: &Blocklist) -> Result<()> {
    claims.validate_shape()?;

    let now = current_unix_seconds();
    if now >= claims.exp {
        return Err(Error::TokenExpired { can_refresh: false });
    }

    if blocklist.contains(&claims.jti).await {
        return Err(Error::TokenRevoked);
    }

    if claims.usage_limit.is_exceeded(used_count) {
        return Err(Error::UsageLimitExceeded);
    }

    Ok(())
}

fn current_unix_seconds() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
