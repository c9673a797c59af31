#![forbid(unsafe_code)]

//! **vaultkeeper** — command-line wrapper around the Vaultkeeper secret
//! custody library: issue capability tokens, redeem them against a
//! backend, and rotate or revoke the encryption key that protects them.

mod cache;
mod redact_output;
mod shared_backend;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vaultkeeper::backend::{Backend, BackendRegistry};
use vaultkeeper::backend::encrypted_file::EncryptedFileBackend;
use vaultkeeper::config::Config;
use vaultkeeper::vault::{SetupOptions, Vault};
use vaultkeeper_core::claims::UsageLimit;
use vaultkeeper_ops::exec::ExecRequest;
use vaultkeeper_ops::fetch::FetchRequest;
use vaultkeeper_ops::sign::SignRequest;

use cache::TokenCache;
use shared_backend::SharedBackend;

#[derive(Parser)]
#[command(name = "vaultkeeper")]
#[command(about = "Local secret-custody library and command wrapper")]
#[command(version)]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(long, default_value = "vaultkeeper.json")]
    config: PathBuf,

    /// Directory for the trust manifest and cached tokens.
    #[arg(long, default_value = ".vaultkeeper")]
    state_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Issue a capability token for a secret.
    Setup {
        #[arg(long)]
        secret: String,
        /// Caller executable path, or "dev" to bypass provenance checks.
        #[arg(long, default_value = "dev")]
        executable: String,
        /// Maximum number of authorizations this token allows.
        #[arg(long)]
        use_limit: Option<u64>,
        #[arg(long)]
        trust_tier: Option<u8>,
    },
    /// Redeem a token, printing the resulting key status.
    Authorize {
        #[arg(long)]
        secret: String,
        #[arg(long)]
        token: Option<String>,
    },
    /// Redeem a token and print the plaintext secret once.
    Get {
        #[arg(long)]
        secret: String,
        #[arg(long)]
        token: Option<String>,
    },
    /// Redeem a token and perform an HTTP request with the secret
    /// substituted into the URL, headers, or body.
    Fetch {
        #[arg(long)]
        secret: String,
        #[arg(long)]
        token: Option<String>,
        #[arg(long, default_value = "GET")]
        method: String,
        #[arg(long)]
        url: String,
        #[arg(long = "header")]
        headers: Vec<String>,
        #[arg(long)]
        body: Option<String>,
    },
    /// Redeem a token and run a command with the secret substituted in.
    Exec {
        #[arg(long)]
        secret: String,
        #[arg(long)]
        token: Option<String>,
        #[arg(long)]
        command: String,
        #[arg(long = "arg")]
        args: Vec<String>,
    },
    /// Redeem a token and sign bytes read from stdin with its PEM key.
    Sign {
        #[arg(long)]
        secret: String,
        #[arg(long)]
        token: Option<String>,
        #[arg(long)]
        algorithm: Option<String>,
    },
    /// Rotate the active encryption key, starting a grace period.
    RotateKey {
        #[arg(long)]
        grace_period_days: u32,
    },
    /// Immediately revoke the active encryption key.
    RevokeKey,
    /// Check that the configured backend is reachable.
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;

    let vault = load_vault(&cli.config, &cli.state_dir).await?;
    let cache = TokenCache::new(&cli.state_dir);

    match cli.command {
        Commands::Setup {
            secret,
            executable,
            use_limit,
            trust_tier,
        } => {
            let options = SetupOptions {
                executable_path: executable,
                use_limit: use_limit.map(UsageLimit::Finite),
                trust_tier,
            };
            let token = vault.setup(&secret, options).await?;
            cache.save(&secret, &token).await?;
            println!("{token}");
        }
        Commands::Authorize { secret, token } => {
            let token = resolve_token(&cache, &secret, token).await?;
            let result = vault.authorize(&token).await?;
            println!("authorized, key_status={:?}", result.key_status);
            if let Some(rotated) = result.rotated_token {
                cache.save(&secret, &rotated).await?;
                println!("token refreshed under current key");
            }
        }
        Commands::Get { secret, token } => {
            let token = resolve_token(&cache, &secret, token).await?;
            let result = vault.authorize(&token).await?;
            if let Some(rotated) = result.rotated_token {
                cache.save(&secret, &rotated).await?;
            }
            let accessor = vault.get_secret(&result.capability).await?;
            let value = accessor
                .read(|bytes| String::from_utf8_lossy(bytes).to_string())
                .context("secret already consumed")?;
            println!("{value}");
        }
        Commands::Fetch {
            secret,
            token,
            method,
            url,
            headers,
            body,
        } => {
            let token = resolve_token(&cache, &secret, token).await?;
            let result = vault.authorize(&token).await?;
            if let Some(rotated) = result.rotated_token {
                cache.save(&secret, &rotated).await?;
            }
            let claims = result.capability.claims().await?;
            let parsed_headers = headers
                .iter()
                .filter_map(|h| h.split_once(':'))
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .collect();
            let request = FetchRequest {
                method,
                url,
                headers: parsed_headers,
                body,
            };
            let response = vault.fetch(&result.capability, &request).await?;
            println!("status: {}", response.status);
            println!("{}", redact_output::scrub(&claims.val, &response.body));
        }
        Commands::Exec {
            secret,
            token,
            command,
            args,
        } => {
            let token = resolve_token(&cache, &secret, token).await?;
            let result = vault.authorize(&token).await?;
            if let Some(rotated) = result.rotated_token {
                cache.save(&secret, &rotated).await?;
            }
            let claims = result.capability.claims().await?;
            let request = ExecRequest {
                command,
                args,
                env: Vec::new(),
            };
            let output = vault.exec(&result.capability, &request).await?;
            println!("{}", redact_output::scrub(&claims.val, &output.stdout));
            eprintln!("{}", redact_output::scrub(&claims.val, &output.stderr));
            std::process::exit(output.exit_code);
        }
        Commands::Sign {
            secret,
            token,
            algorithm,
        } => {
            use std::io::Read;
            let token = resolve_token(&cache, &secret, token).await?;
            let result = vault.authorize(&token).await?;
            if let Some(rotated) = result.rotated_token {
                cache.save(&secret, &rotated).await?;
            }
            let mut data = Vec::new();
            std::io::stdin()
                .read_to_end(&mut data)
                .context("reading stdin to sign")?;
            let request = SignRequest {
                data,
                algorithm_override: algorithm,
            };
            let signed = vault.sign(&result.capability, &request).await?;
            println!("{} {}", signed.algorithm, signed.signature_base64);
        }
        Commands::RotateKey { grace_period_days } => {
            vault.rotate_key(grace_period_days).await?;
            info!(grace_period_days, "key rotated");
            println!("key rotated, grace period {grace_period_days} day(s)");
        }
        Commands::RevokeKey => {
            vault.revoke_key().await?;
            info!("key revoked");
            println!("key revoked");
        }
        Commands::Doctor => {
            println!("configuration loaded from {}", cli.config.display());
            println!("state directory: {}", cli.state_dir.display());
            println!("vault initialized successfully");
        }
    }

    Ok(())
}

async fn resolve_token(cache: &TokenCache, secret: &str, explicit: Option<String>) -> Result<String> {
    if let Some(token) = explicit {
        return Ok(token);
    }
    cache
        .load(secret)
        .await?
        .context("no token provided and none cached; run `setup` first")
}

async fn load_vault(config_path: &std::path::Path, state_dir: &std::path::Path) -> Result<Vault> {
    let bytes = tokio::fs::read(config_path)
        .await
        .with_context(|| format!("reading config file {}", config_path.display()))?;
    let config = Config::from_json(&bytes).context("parsing configuration")?;

    let registry = build_registry(&config, state_dir).await?;
    Vault::init(config, state_dir.to_path_buf(), &registry)
        .await
        .context("initializing vault")
}

async fn build_registry(config: &Config, state_dir: &std::path::Path) -> Result<BackendRegistry> {
    let mut registry = BackendRegistry::default();

    let wants_encrypted_file = config
        .backends
        .iter()
        .any(|b| b.enabled && b.backend_type == "encrypted-file");
    if wants_encrypted_file {
        let entry = config
            .backends
            .iter()
            .find(|b| b.backend_type == "encrypted-file")
            .expect("checked above");
        let base = entry
            .path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| state_dir.to_path_buf());
        let backend = EncryptedFileBackend::open(base.join("secrets.blob"), base.join("secrets.key"))
            .await
            .context("opening encrypted-file backend")?;
        let shared: Arc<Box<dyn Backend>> = Arc::new(Box::new(backend));
        registry.register("encrypted-file", move || Box::new(SharedBackend(shared.clone())));
    }

    Ok(registry)
}

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
    Ok(())
}
