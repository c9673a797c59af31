//! Reference backend that persists secrets as a single AES-256-GCM
//! encrypted JSON blob on disk, keyed by a locally generated key file.
//! Grounded on the vault-over-a-datastore shape of a sled-backed AES-GCM
//! store, with the embedded KV store swapped for a single blob file since
//! this is a reference implementation, not a production one.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use async_trait::async_trait;
use base64::Engine;
use rand::RngCore;
use tokio::sync::RwLock;

use vaultkeeper_core::error::{Error, Result};

use super::Backend;

fn b64() -> base64::engine::GeneralPurpose {
    base64::engine::general_purpose::STANDARD
}

pub struct EncryptedFileBackend {
    blob_path: PathBuf,
    key_path: PathBuf,
    key: [u8; 32],
    cache: RwLock<HashMap<String, String>>,
}

impl EncryptedFileBackend {
    pub async fn open(blob_path: PathBuf, key_path: PathBuf) -> Result<Self> {
        let key = load_or_create_key(&key_path).await?;
        let cache = load_blob(&blob_path, &key).await?;
        Ok(EncryptedFileBackend {
            blob_path,
            key_path,
            key,
            cache: RwLock::new(cache),
        })
    }

    async fn persist(&self) -> Result<()> {
        let cache = self.cache.read().await;
        let plaintext = serde_json::to_vec(&*cache).map_err(|e| Error::Filesystem {
            path: self.blob_path.display().to_string(),
            message: format!("failed to serialize secret blob: {e}"),
            required_permission: "write".to_string(),
        })?;

        let mut nonce_bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_slice())
            .map_err(|_| Error::Filesystem {
                path: self.blob_path.display().to_string(),
                message: "encryption failed".to_string(),
                required_permission: "write".to_string(),
            })?;

        let mut sealed = Vec::with_capacity(nonce_bytes.len() + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);

        let tmp_path = self.blob_path.with_extension("blob.tmp");
        tokio::fs::write(&tmp_path, b64().encode(&sealed))
            .await
            .map_err(|e| Error::Filesystem {
                path: tmp_path.display().to_string(),
                message: e.to_string(),
                required_permission: "write".to_string(),
            })?;
        tokio::fs::rename(&tmp_path, &self.blob_path)
            .await
            .map_err(|e| Error::Filesystem {
                path: self.blob_path.display().to_string(),
                message: e.to_string(),
                required_permission: "rename".to_string(),
            })?;
        Ok(())
    }
}

async fn load_or_create_key(key_path: &Path) -> Result<[u8; 32]> {
    match tokio::fs::read(key_path).await {
        Ok(bytes) => {
            let decoded = b64().decode(bytes).map_err(|e| Error::Filesystem {
                path: key_path.display().to_string(),
                message: format!("malformed key file: {e}"),
                required_permission: "read".to_string(),
            })?;
            decoded.try_into().map_err(|_| Error::Filesystem {
                path: key_path.display().to_string(),
                message: "key file does not contain 32 bytes".to_string(),
                required_permission: "read".to_string(),
            })
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let mut key = [0u8; 32];
            rand::thread_rng().fill_bytes(&mut key);
            if let Some(parent) = key_path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| Error::Filesystem {
                        path: parent.display().to_string(),
                        message: e.to_string(),
                        required_permission: "create directory".to_string(),
                    })?;
            }
            tokio::fs::write(key_path, b64().encode(key))
                .await
                .map_err(|e| Error::Filesystem {
                    path: key_path.display().to_string(),
                    message: e.to_string(),
                    required_permission: "write".to_string(),
                })?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                tokio::fs::set_permissions(key_path, std::fs::Permissions::from_mode(0o600))
                    .await
                    .ok();
            }
            Ok(key)
        }
        Err(e) => Err(Error::Filesystem {
            path: key_path.display().to_string(),
            message: e.to_string(),
            required_permission: "read".to_string(),
        }),
    }
}

async fn load_blob(blob_path: &Path, key: &[u8; 32]) -> Result<HashMap<String, String>> {
    let encoded = match tokio::fs::read(blob_path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(e) => {
            return Err(Error::Filesystem {
                path: blob_path.display().to_string(),
                message: e.to_string(),
                required_permission: "read".to_string(),
            })
        }
    };
    let sealed = b64().decode(encoded).map_err(|e| Error::Filesystem {
        path: blob_path.display().to_string(),
        message: format!("malformed secret blob: {e}"),
        required_permission: "read".to_string(),
    })?;
    if sealed.len() < 12 {
        return Err(Error::Filesystem {
            path: blob_path.display().to_string(),
            message: "secret blob too short to contain a nonce".to_string(),
            required_permission: "read".to_string(),
        });
    }
    let (nonce_bytes, ciphertext) = sealed.split_at(12);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Nonce::from_slice(nonce_bytes);
    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| Error::Filesystem {
            path: blob_path.display().to_string(),
            message: "decryption failed".to_string(),
            required_permission: "read".to_string(),
        })?;
    serde_json::from_slice(&plaintext).map_err(|e| Error::Filesystem {
        path: blob_path.display().to_string(),
        message: format!("malformed secret blob JSON: {e}"),
        required_permission: "read".to_string(),
    })
}

#[async_trait]
impl Backend for EncryptedFileBackend {
    fn backend_type(&self) -> &'static str {
        "encrypted-file"
    }

    fn display_name(&self) -> &'static str {
        "Encrypted file"
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn store(&self, id: &str, secret: &str) -> Result<()> {
        self.cache.write().await.insert(id.to_string(), secret.to_string());
        self.persist().await
    }

    async fn retrieve(&self, id: &str) -> Result<String> {
        self.cache
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| Error::SecretNotFound { id: id.to_string() })
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let removed = self.cache.write().await.remove(id).is_some();
        if !removed {
            return Err(Error::SecretNotFound { id: id.to_string() });
        }
        self.persist().await
    }

    async fn exists(&self, id: &str) -> bool {
        self.cache.read().await.contains_key(id)
    }

    async fn list(&self) -> Option<Vec<String>> {
        Some(self.cache.read().await.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let blob_path = dir.path().join("secrets.blob");
        let key_path = dir.path().join("secrets.key");

        let backend = EncryptedFileBackend::open(blob_path.clone(), key_path.clone())
            .await
            .unwrap();
        backend.store("api-key", "sk-live-abc").await.unwrap();

        let reopened = EncryptedFileBackend::open(blob_path, key_path).await.unwrap();
        assert_eq!(reopened.retrieve("api-key").await.unwrap(), "sk-live-abc");
    }

    #[tokio::test]
    async fn missing_entry_fails() {
        let dir = tempfile::tempdir().unwrap();
        let backend = EncryptedFileBackend::open(
            dir.path().join("secrets.blob"),
            dir.path().join("secrets.key"),
        )
        .await
        .unwrap();
        let err = backend.retrieve("nope").await.unwrap_err();
        assert!(matches!(err, Error::SecretNotFound { .. }));
    }
}
