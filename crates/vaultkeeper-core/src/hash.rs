//! Streaming SHA-256 of a file's contents, used for executable-identity
//! hashing during trust verification.

use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

use crate::error::{Error, Result};

const CHUNK_SIZE: usize = 64 * 1024;

/// Returns the lowercase hex SHA-256 digest of the file at `path`.
pub async fn hash_file(path: &std::path::Path) -> Result<String> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| Error::Filesystem {
            path: path.display().to_string(),
            message: e.to_string(),
            required_permission: "read".to_string(),
        })?;

    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = file
            .read(&mut buf)
            .await
            .map_err(|e| Error::Filesystem {
                path: path.display().to_string(),
                message: e.to_string(),
                required_permission: "read".to_string(),
            })?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hashes_known_content() {
        let dir = tempfile_dir();
        let path = dir.join("sample.txt");
        tokio::fs::write(&path, b"hello world").await.unwrap();
        let digest = hash_file(&path).await.unwrap();
        assert_eq!(
            digest,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[tokio::test]
    async fn missing_file_is_filesystem_error() {
        let dir = tempfile_dir();
        let path = dir.join("nope.txt");
        let err = hash_file(&path).await.unwrap_err();
        assert!(matches!(err, Error::Filesystem { .. }));
    }

    fn tempfile_dir() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "vaultkeeper-hash-test-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}
