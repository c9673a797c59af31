//! Persistent `namespace -> (approved hash set, tier)` trust manifest,
//! written with a single-writer write-to-temp-then-rename discipline and
//! restrictive file permissions.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use vaultkeeper_core::claims::TrustTier;
use vaultkeeper_core::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawEntry {
    hashes: Vec<String>,
    tier: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct RawManifest {
    version: u32,
    entries: BTreeMap<String, RawEntry>,
}

/// One namespace's approved hash set and trust tier.
#[derive(Debug, Clone)]
pub struct TrustManifestEntry {
    pub hashes: BTreeSet<String>,
    pub tier: TrustTier,
}

/// In-memory view of the trust manifest. Values are immutable once loaded;
/// `add_trusted` returns a new manifest rather than mutating in place.
#[derive(Debug, Clone, Default)]
pub struct TrustManifest {
    entries: BTreeMap<String, TrustManifestEntry>,
}

impl TrustManifest {
    pub fn empty() -> Self {
        TrustManifest {
            entries: BTreeMap::new(),
        }
    }

    pub fn entry(&self, namespace: &str) -> Option<&TrustManifestEntry> {
        self.entries.get(namespace)
    }

    /// Loads the manifest at `path`. A missing file yields an empty
    /// manifest; unparseable content is a hard error. Entries whose tier
    /// is outside `{1,2,3}` are silently dropped.
    pub async fn load(path: &Path) -> Result<Self> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::empty());
            }
            Err(e) => {
                return Err(Error::Filesystem {
                    path: path.display().to_string(),
                    message: e.to_string(),
                    required_permission: "read".to_string(),
                });
            }
        };

        let raw: RawManifest =
            serde_json::from_slice(&bytes).map_err(|e| Error::Filesystem {
                path: path.display().to_string(),
                message: format!("unparseable trust manifest: {e}"),
                required_permission: "read".to_string(),
            })?;

        let mut entries = BTreeMap::new();
        for (namespace, raw_entry) in raw.entries {
            if let Some(tier) = TrustTier::from_u8(raw_entry.tier) {
                entries.insert(
                    namespace,
                    TrustManifestEntry {
                        hashes: raw_entry.hashes.into_iter().collect(),
                        tier,
                    },
                );
            }
        }
        Ok(TrustManifest { entries })
    }

    /// Persists the manifest to `path` via write-to-temp + rename, with
    /// 0600 file permissions (0700 on the containing directory).
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Filesystem {
                    path: parent.display().to_string(),
                    message: e.to_string(),
                    required_permission: "create directory".to_string(),
                })?;
            set_permissions(parent, 0o700).await?;
        }

        let raw = RawManifest {
            version: 1,
            entries: self
                .entries
                .iter()
                .map(|(namespace, entry)| {
                    (
                        namespace.clone(),
                        RawEntry {
                            hashes: entry.hashes.iter().cloned().collect(),
                            tier: entry.tier.as_u8(),
                        },
                    )
                })
                .collect(),
        };
        let json = serde_json::to_vec_pretty(&raw).map_err(|e| Error::Filesystem {
            path: path.display().to_string(),
            message: format!("failed to serialize trust manifest: {e}"),
            required_permission: "write".to_string(),
        })?;

        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &json)
            .await
            .map_err(|e| Error::Filesystem {
                path: tmp_path.display().to_string(),
                message: e.to_string(),
                required_permission: "write".to_string(),
            })?;
        set_permissions(&tmp_path, 0o600).await?;
        tokio::fs::rename(&tmp_path, path)
            .await
            .map_err(|e| Error::Filesystem {
                path: path.display().to_string(),
                message: e.to_string(),
                required_permission: "rename".to_string(),
            })?;
        Ok(())
    }

    /// Pure: returns a new manifest with `hash` recorded under `namespace`.
    /// Creates the entry with tier 3 if absent; otherwise preserves the
    /// existing tier and deduplicates the hash set. Does not mutate self.
    pub fn add_trusted(&self, namespace: &str, hash: &str) -> TrustManifest {
        let mut entries = self.entries.clone();
        entries
            .entry(namespace.to_string())
            .and_modify(|entry| {
                entry.hashes.insert(hash.to_string());
            })
            .or_insert_with(|| {
                let mut hashes = BTreeSet::new();
                hashes.insert(hash.to_string());
                TrustManifestEntry {
                    hashes,
                    tier: TrustTier::Unverified,
                }
            });
        TrustManifest { entries }
    }
}

#[cfg(unix)]
async fn set_permissions(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .await
        .map_err(|e| Error::Filesystem {
            path: path.display().to_string(),
            message: e.to_string(),
            required_permission: format!("chmod {mode:o}"),
        })
}

#[cfg(not(unix))]
async fn set_permissions(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trust-manifest.json");
        let manifest = TrustManifest::load(&path).await.unwrap();
        assert!(manifest.entry("anything").is_none());
    }

    #[tokio::test]
    async fn save_then_load_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trust-manifest.json");
        let manifest = TrustManifest::empty().add_trusted("ns", "hash1");
        manifest.save(&path).await.unwrap();
        let loaded = TrustManifest::load(&path).await.unwrap();
        let entry = loaded.entry("ns").unwrap();
        assert!(entry.hashes.contains("hash1"));
        assert_eq!(entry.tier, TrustTier::Unverified);
    }

    #[tokio::test]
    async fn unparseable_content_is_hard_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trust-manifest.json");
        tokio::fs::write(&path, b"not json").await.unwrap();
        let err = TrustManifest::load(&path).await.unwrap_err();
        assert!(matches!(err, Error::Filesystem { .. }));
    }

    #[test]
    fn add_trusted_does_not_mutate_original() {
        let original = TrustManifest::empty();
        let updated = original.add_trusted("ns", "hash1");
        assert!(original.entry("ns").is_none());
        assert!(updated.entry("ns").is_some());
    }

    #[test]
    fn add_trusted_preserves_existing_tier() {
        let mut entries = BTreeMap::new();
        let mut hashes = BTreeSet::new();
        hashes.insert("hash1".to_string());
        entries.insert(
            "ns".to_string(),
            TrustManifestEntry {
                hashes,
                tier: TrustTier::ManifestApproved,
            },
        );
        let manifest = TrustManifest { entries };
        let updated = manifest.add_trusted("ns", "hash2");
        let entry = updated.entry("ns").unwrap();
        assert_eq!(entry.tier, TrustTier::ManifestApproved);
        assert!(entry.hashes.contains("hash1"));
        assert!(entry.hashes.contains("hash2"));
    }
}
