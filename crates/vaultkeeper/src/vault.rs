//! The orchestrator: wires the key manager, token codec, trust manifest,
//! claims store, blocklist, and delegated ops into the public
//! `init/setup/authorize/fetch/exec/getSecret/sign/rotateKey/revokeKey/
//! setDevelopmentMode` surface.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, info};

use vaultkeeper_capability::accessor::SingleUseAccessor;
use vaultkeeper_capability::blocklist::Blocklist;
use vaultkeeper_capability::store::ClaimsStore;
use vaultkeeper_capability::token::CapabilityToken;
use vaultkeeper_capability::validator;
use vaultkeeper_core::claims::{Claims, UsageLimit};
use vaultkeeper_core::error::{Error, Result};
use vaultkeeper_crypto::key_manager::KeyManager;
use vaultkeeper_crypto::token_codec;
use vaultkeeper_ops::exec::{delegated_exec, ExecRequest, ExecResult};
use vaultkeeper_ops::fetch::{delegated_fetch, FetchRequest, FetchResponse};
use vaultkeeper_ops::sign::{delegated_sign, SignRequest, SignResult};
use vaultkeeper_trust::manifest::TrustManifest;
use vaultkeeper_trust::verify::{verify_trust, NoopProvenanceVerifier, ProvenanceVerifier};

use crate::backend::{Backend, BackendRegistry};
use crate::config::Config;

/// Which key decrypted a presented token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStatus {
    Current,
    Previous,
}

#[derive(Debug, Clone, Default)]
pub struct SetupOptions {
    pub executable_path: String,
    pub use_limit: Option<UsageLimit>,
    pub trust_tier: Option<u8>,
}

#[derive(Debug, Clone)]
pub struct AuthorizeResult {
    pub capability: CapabilityToken,
    pub key_status: KeyStatus,
    /// Populated only when the presented token decrypted under the
    /// previous key — the refreshed token, re-encrypted under current.
    pub rotated_token: Option<String>,
}

pub struct Vault {
    key_manager: KeyManager,
    backend: Box<dyn Backend>,
    claims_store: Arc<ClaimsStore>,
    blocklist: Blocklist,
    usage_counts: RwLock<HashMap<String, u64>>,
    trust_manifest: RwLock<TrustManifest>,
    manifest_path: PathBuf,
    config: RwLock<Config>,
    provenance: Box<dyn ProvenanceVerifier>,
}

impl Vault {
    /// Runs preflight (none by default), selects the first enabled and
    /// available backend from `config`, and initializes the key manager.
    pub async fn init(config: Config, config_dir: PathBuf, registry: &BackendRegistry) -> Result<Self> {
        let backend = registry.first_available(&config.enabled_backend_types()).await?;
        let key_manager = KeyManager::new();
        key_manager.init().await?;

        let manifest_path = config_dir.join("trust-manifest.json");
        let trust_manifest = TrustManifest::load(&manifest_path).await?;

        info!(backend = backend.backend_type(), "vault initialized");

        Ok(Vault {
            key_manager,
            backend,
            claims_store: Arc::new(ClaimsStore::new()),
            blocklist: Blocklist::new(),
            usage_counts: RwLock::new(HashMap::new()),
            trust_manifest: RwLock::new(trust_manifest),
            manifest_path,
            config: RwLock::new(config),
            provenance: Box::new(NoopProvenanceVerifier),
        })
    }

    pub async fn setup(&self, secret_name: &str, options: SetupOptions) -> Result<String> {
        let plaintext = self.backend.retrieve(secret_name).await?;

        let config = self.config.read().await;
        let exe = if config.is_dev_allowlisted(&options.executable_path) {
            "dev".to_string()
        } else {
            let manifest = self.trust_manifest.read().await.clone();
            let result =
                verify_trust(&options.executable_path, None, &manifest, self.provenance.as_ref())
                    .await?;
            if result.conflict {
                return Err(Error::IdentityMismatch {
                    previous: "<approved-set>".to_string(),
                    current: result.hash,
                });
            }
            if let Some(updated) = result.updated_manifest {
                updated.save(&self.manifest_path).await?;
                *self.trust_manifest.write().await = updated;
            }
            result.hash
        };

        let now = now_seconds();
        let claims = Claims {
            jti: format!("jti-{}-{}", now, rand_hex(4)),
            iat: now,
            exp: now + (config.defaults.ttl_minutes as i64) * 60,
            sub: secret_name.to_string(),
            exe,
            usage_limit: options.use_limit.unwrap_or(UsageLimit::Unlimited),
            tid: options.trust_tier.unwrap_or(config.defaults.trust_tier),
            bkd: self.backend.backend_type().to_string(),
            val: plaintext,
            reference: secret_name.to_string(),
        };

        let current_key = self.key_manager.current_key().await?;
        token_codec::encrypt(current_key.bytes(), Some(&current_key.id), &claims)
    }

    pub async fn authorize(&self, token: &str) -> Result<AuthorizeResult> {
        let kid = token_codec::extract_kid(token)?;

        let (claims, key_status) = match kid {
            Some(kid) => {
                let key = self
                    .key_manager
                    .find(&kid)
                    .await
                    .ok_or_else(|| Error::KeyRevoked { kid: kid.clone() })?;
                let claims = token_codec::decrypt(key.bytes(), token)?;
                let current = self.key_manager.current_key().await?;
                let status = if current.id == kid {
                    KeyStatus::Current
                } else {
                    KeyStatus::Previous
                };
                (claims, status)
            }
            None => {
                let current = self.key_manager.current_key().await?;
                match token_codec::decrypt(current.bytes(), token) {
                    Ok(claims) => (claims, KeyStatus::Current),
                    Err(_) => {
                        let previous = self
                            .key_manager
                            .previous_key()
                            .await
                            .ok_or(Error::DecryptionFailed)?;
                        let claims = token_codec::decrypt(previous.bytes(), token)?;
                        (claims, KeyStatus::Previous)
                    }
                }
            }
        };

        let used_count = {
            let counts = self.usage_counts.read().await;
            counts.get(&claims.jti).copied().unwrap_or(0)
        };
        validator::validate(&claims, used_count, &self.blocklist).await?;

        let new_used_count = used_count + 1;
        {
            let mut counts = self.usage_counts.write().await;
            if claims.usage_limit.is_exceeded(new_used_count) {
                counts.remove(&claims.jti);
                self.blocklist.insert(claims.jti.clone()).await;
                debug!(jti = %claims.jti, "usage budget reached, blocklisting");
            } else {
                counts.insert(claims.jti.clone(), new_used_count);
            }
        }

        let rotated_token = if key_status == KeyStatus::Previous {
            let current = self.key_manager.current_key().await?;
            Some(token_codec::encrypt(
                current.bytes(),
                Some(&current.id),
                &claims,
            )?)
        } else {
            None
        };

        let handle = self.claims_store.insert(claims).await;
        let capability = CapabilityToken::new(handle, Arc::clone(&self.claims_store));

        Ok(AuthorizeResult {
            capability,
            key_status,
            rotated_token,
        })
    }

    pub async fn get_secret(&self, capability: &CapabilityToken) -> Result<SingleUseAccessor> {
        let claims = capability.claims().await?;
        Ok(SingleUseAccessor::new(&claims.val))
    }

    pub async fn fetch(
        &self,
        capability: &CapabilityToken,
        request: &FetchRequest,
    ) -> Result<FetchResponse> {
        delegated_fetch(capability, request).await
    }

    pub async fn exec(
        &self,
        capability: &CapabilityToken,
        request: &ExecRequest,
    ) -> Result<ExecResult> {
        delegated_exec(capability, request).await
    }

    pub async fn sign(
        &self,
        capability: &CapabilityToken,
        request: &SignRequest,
    ) -> Result<SignResult> {
        delegated_sign(capability, request).await
    }

    pub async fn rotate_key(&self, grace_period_days: u32) -> Result<()> {
        self.key_manager
            .rotate(Duration::from_secs(u64::from(grace_period_days) * 86_400))
            .await
    }

    pub async fn revoke_key(&self) -> Result<()> {
        self.key_manager.revoke().await
    }

    /// In-memory only; persistence is a collaborator concern.
    pub async fn set_development_mode(&self, exec_path: &str, enabled: bool) {
        self.config.write().await.set_development_mode(exec_path, enabled);
    }
}

fn now_seconds() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

fn rand_hex(len: usize) -> String {
    use rand::RngCore;
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
