//! Computes the current executable hash, consults the trust manifest, and
//! classifies the caller into tier 1 (provenance-verified), tier 2
//! (manifest-approved), or tier 3 (unverified / first use).

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use vaultkeeper_core::claims::TrustTier;
use vaultkeeper_core::error::Result;
use vaultkeeper_core::hash::hash_file;

use crate::manifest::TrustManifest;

/// Optional external provenance check (e.g. a code-signing verifier).
/// Absent by default — `NoopProvenanceVerifier` always reports failure,
/// which simply skips tier 1 and falls through to tier 2/3 evaluation.
#[async_trait]
pub trait ProvenanceVerifier: Send + Sync {
    async fn verify(&self, exec_path: &Path) -> bool;
}

pub struct NoopProvenanceVerifier;

#[async_trait]
impl ProvenanceVerifier for NoopProvenanceVerifier {
    async fn verify(&self, _exec_path: &Path) -> bool {
        false
    }
}

/// The outcome of a trust check for one invocation.
#[derive(Debug, Clone)]
pub struct TrustResult {
    pub hash: String,
    pub tier: TrustTier,
    pub verified: bool,
    pub conflict: bool,
    pub reason: Option<String>,
    /// `Some` when the manifest changed and must be saved by the caller.
    pub updated_manifest: Option<TrustManifest>,
}

/// Classifies `exec_path` against `manifest` under `namespace` (defaults
/// to `exec_path` itself when `namespace` is `None`). Performs no I/O and
/// returns no manifest update when `exec_path == "dev"`.
pub async fn verify_trust(
    exec_path: &str,
    namespace: Option<&str>,
    manifest: &TrustManifest,
    provenance: &dyn ProvenanceVerifier,
) -> Result<TrustResult> {
    if exec_path == "dev" {
        return Ok(TrustResult {
            hash: "dev".to_string(),
            tier: TrustTier::Unverified,
            verified: false,
            conflict: false,
            reason: Some("dev mode".to_string()),
            updated_manifest: None,
        });
    }

    let namespace = namespace.unwrap_or(exec_path).to_string();
    let hash = hash_file(Path::new(exec_path)).await?;

    if provenance.verify(Path::new(exec_path)).await {
        info!(%namespace, %hash, "tier 1 provenance verification succeeded");
        let updated = manifest.add_trusted(&namespace, &hash);
        return Ok(TrustResult {
            hash,
            tier: TrustTier::ProvenanceVerified,
            verified: true,
            conflict: false,
            reason: None,
            updated_manifest: Some(updated),
        });
    }

    if let Some(entry) = manifest.entry(&namespace) {
        if entry.hashes.contains(&hash) {
            debug!(%namespace, %hash, "tier 2 manifest match");
            return Ok(TrustResult {
                hash,
                tier: TrustTier::ManifestApproved,
                verified: true,
                conflict: false,
                reason: None,
                updated_manifest: None,
            });
        }
        if !entry.hashes.is_empty() {
            warn!(%namespace, %hash, "TOFU conflict: hash not in approved set");
            return Ok(TrustResult {
                hash,
                tier: TrustTier::Unverified,
                verified: false,
                conflict: true,
                reason: Some("executable hash does not match any approved hash".to_string()),
                updated_manifest: None,
            });
        }
    }

    info!(%namespace, %hash, "first use, recording hash");
    let updated = manifest.add_trusted(&namespace, &hash);
    Ok(TrustResult {
        hash,
        tier: TrustTier::Unverified,
        verified: false,
        conflict: false,
        reason: Some("first use".to_string()),
        updated_manifest: Some(updated),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dev_mode_skips_io() {
        let manifest = TrustManifest::empty();
        let result = verify_trust("dev", None, &manifest, &NoopProvenanceVerifier)
            .await
            .unwrap();
        assert_eq!(result.hash, "dev");
        assert!(!result.verified);
        assert!(!result.conflict);
        assert!(result.updated_manifest.is_none());
    }

    #[tokio::test]
    async fn first_use_records_hash() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("bin");
        tokio::fs::write(&exe, b"v1").await.unwrap();

        let manifest = TrustManifest::empty();
        let result = verify_trust(
            exe.to_str().unwrap(),
            None,
            &manifest,
            &NoopProvenanceVerifier,
        )
        .await
        .unwrap();

        assert_eq!(result.tier, TrustTier::Unverified);
        assert!(!result.conflict);
        assert!(result.updated_manifest.is_some());
    }

    #[tokio::test]
    async fn second_use_same_hash_is_tier_two() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("bin");
        tokio::fs::write(&exe, b"v1").await.unwrap();

        let manifest = TrustManifest::empty();
        let first = verify_trust(
            exe.to_str().unwrap(),
            None,
            &manifest,
            &NoopProvenanceVerifier,
        )
        .await
        .unwrap();
        let manifest = first.updated_manifest.unwrap();

        let second = verify_trust(
            exe.to_str().unwrap(),
            None,
            &manifest,
            &NoopProvenanceVerifier,
        )
        .await
        .unwrap();
        assert_eq!(second.tier, TrustTier::ManifestApproved);
        assert!(second.verified);
        assert!(second.updated_manifest.is_none());
    }

    #[tokio::test]
    async fn changed_hash_is_tofu_conflict_and_does_not_persist() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("bin");
        tokio::fs::write(&exe, b"v1").await.unwrap();

        let manifest = TrustManifest::empty();
        let first = verify_trust(
            exe.to_str().unwrap(),
            None,
            &manifest,
            &NoopProvenanceVerifier,
        )
        .await
        .unwrap();
        let manifest = first.updated_manifest.unwrap();

        tokio::fs::write(&exe, b"v2").await.unwrap();
        let second = verify_trust(
            exe.to_str().unwrap(),
            None,
            &manifest,
            &NoopProvenanceVerifier,
        )
        .await
        .unwrap();

        assert!(second.conflict);
        assert_eq!(second.tier, TrustTier::Unverified);
        assert!(!second.verified);
        assert!(second.updated_manifest.is_none());
    }
}
