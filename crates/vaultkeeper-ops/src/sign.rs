//! `delegatedSign` — signs bytes with a PEM-encoded private key carried as
//! a capability token's secret value, never returning the key material
//! itself.
//!
//! Ed25519 and Ed448 keys ignore any hash-algorithm override and sign
//! with their implicit algorithm. Other keys (RSA) default to SHA-256;
//! an override must be one of `sha256`/`sha384`/`sha512` (case
//! insensitive) or the request fails `InvalidAlgorithm` — a failure that
//! always propagates rather than being swallowed.

use base64::Engine;
use ed25519_dalek::pkcs8::DecodePrivateKey;
use ed25519_dalek::Signer;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey as RsaDecodePrivateKey;
use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use sha2::{Digest, Sha256, Sha384, Sha512};

use vaultkeeper_capability::token::CapabilityToken;
use vaultkeeper_core::error::{Error, Result};

use crate::keytype::is_ed448_pem;

const ALLOWED_OVERRIDES: [&str; 3] = ["sha256", "sha384", "sha512"];

#[derive(Debug, Clone)]
pub struct SignRequest {
    pub data: Vec<u8>,
    pub algorithm_override: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SignResult {
    pub signature_base64: String,
    pub algorithm: String,
}

fn b64() -> base64::engine::GeneralPurpose {
    base64::engine::general_purpose::STANDARD
}

pub async fn delegated_sign(token: &CapabilityToken, request: &SignRequest) -> Result<SignResult> {
    let claims = token.claims().await?;
    let pem = &claims.val;

    if is_ed448_pem(pem) {
        return Err(Error::InvalidAlgorithm {
            requested: "ed448".to_string(),
            allowed: vec!["ed25519".to_string(), "rsa-sha256/384/512".to_string()],
        });
    }

    if let Ok(signing_key) = ed25519_dalek::SigningKey::from_pkcs8_pem(pem) {
        let signature = signing_key.sign(&request.data);
        return Ok(SignResult {
            signature_base64: b64().encode(signature.to_bytes()),
            algorithm: "ed25519".to_string(),
        });
    }

    let rsa_key = RsaPrivateKey::from_pkcs8_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
        .map_err(|_| Error::MalformedClaims {
            reason: "unrecognized private key PEM".to_string(),
        })?;

    let algorithm = normalize_algorithm(request.algorithm_override.as_deref())?;
    let signature = sign_rsa(&rsa_key, &algorithm, &request.data)?;

    Ok(SignResult {
        signature_base64: b64().encode(signature),
        algorithm,
    })
}

pub(crate) fn normalize_algorithm(requested: Option<&str>) -> Result<String> {
    match requested {
        None => Ok("sha256".to_string()),
        Some(raw) => {
            let lower = raw.to_lowercase();
            if ALLOWED_OVERRIDES.contains(&lower.as_str()) {
                Ok(lower)
            } else {
                Err(Error::InvalidAlgorithm {
                    requested: raw.to_string(),
                    allowed: ALLOWED_OVERRIDES.iter().map(|s| s.to_string()).collect(),
                })
            }
        }
    }
}

fn sign_rsa(key: &RsaPrivateKey, algorithm: &str, data: &[u8]) -> Result<Vec<u8>> {
    let signed = match algorithm {
        "sha256" => {
            let digest = Sha256::digest(data);
            key.sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
        }
        "sha384" => {
            let digest = Sha384::digest(data);
            key.sign(Pkcs1v15Sign::new::<Sha384>(), &digest)
        }
        "sha512" => {
            let digest = Sha512::digest(data);
            key.sign(Pkcs1v15Sign::new::<Sha512>(), &digest)
        }
        other => {
            return Err(Error::InvalidAlgorithm {
                requested: other.to_string(),
                allowed: ALLOWED_OVERRIDES.iter().map(|s| s.to_string()).collect(),
            })
        }
    };
    signed.map_err(|e| Error::Setup {
        dependency: format!("rsa signing: {e}"),
    })
}
