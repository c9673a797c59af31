//! Per-caller token cache: `setup` writes the issued token next to the
//! state directory so a later `authorize`/`get`/`exec`/`sign` invocation
//! in the same shell session can omit it. Not a security boundary — the
//! token is already an encrypted, single-use-budgeted capability; this
//! is purely ergonomics, mirrored on the reference encrypted-file
//! backend's write-to-temp-then-rename discipline.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub struct TokenCache {
    dir: PathBuf,
}

impl TokenCache {
    pub fn new(state_dir: &Path) -> Self {
        TokenCache {
            dir: state_dir.join("token-cache"),
        }
    }

    fn path_for(&self, secret_name: &str) -> PathBuf {
        self.dir.join(format!("{secret_name}.token"))
    }

    pub async fn save(&self, secret_name: &str, token: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating token cache directory {}", self.dir.display()))?;
        let path = self.path_for(secret_name);
        let tmp_path = path.with_extension("token.tmp");
        tokio::fs::write(&tmp_path, token)
            .await
            .with_context(|| format!("writing {}", tmp_path.display()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))
                .await
                .ok();
        }
        tokio::fs::rename(&tmp_path, &path)
            .await
            .with_context(|| format!("renaming into {}", path.display()))?;
        Ok(())
    }

    pub async fn load(&self, secret_name: &str) -> Result<Option<String>> {
        match tokio::fs::read_to_string(self.path_for(secret_name)).await {
            Ok(token) => Ok(Some(token)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).context("reading cached token"),
        }
    }
}
