//! Encodes and decodes the five-segment capability token wire format:
//! `H.E.I.C.T` — header, empty key-agreement segment, IV, ciphertext, tag.
//! Exactly AES-256-GCM, 96-bit random IV, 128-bit tag. No other algorithm
//! is ever accepted.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use vaultkeeper_core::claims::Claims;
use vaultkeeper_core::error::{Error, Result};

const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;

fn b64() -> base64::engine::GeneralPurpose {
    base64::engine::general_purpose::URL_SAFE_NO_PAD
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    enc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    kid: Option<String>,
}

/// Encrypts `claims` under `key`, embedding `kid` in the header if given.
pub fn encrypt(key: &[u8; 32], kid: Option<&str>, claims: &Claims) -> Result<String> {
    let header = Header {
        alg: "dir".to_string(),
        enc: "A256GCM".to_string(),
        kid: kid.map(|s| s.to_string()),
    };
    let header_json = serde_json::to_vec(&header).map_err(|e| Error::MalformedClaims {
        reason: format!("failed to serialize header: {e}"),
    })?;

    let plaintext = serde_json::to_vec(claims).map_err(|e| Error::MalformedClaims {
        reason: format!("failed to serialize claims: {e}"),
    })?;

    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Nonce::from_slice(&iv);
    let sealed = cipher
        .encrypt(nonce, plaintext.as_slice())
        .map_err(|_| Error::DecryptionFailed)?;

    let split_at = sealed.len() - TAG_LEN;
    let (ciphertext, tag) = sealed.split_at(split_at);

    Ok(format!(
        "{}.{}.{}.{}.{}",
        b64().encode(&header_json),
        "",
        b64().encode(iv),
        b64().encode(ciphertext),
        b64().encode(tag),
    ))
}

/// Decrypts a five-segment token under `key`, returning its validated
/// `Claims` shape.
pub fn decrypt(key: &[u8; 32], token: &str) -> Result<Claims> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 5 {
        return Err(Error::MalformedToken {
            reason: format!("expected 5 segments, got {}", segments.len()),
        });
    }

    let header_bytes = b64()
        .decode(segments[0])
        .map_err(|_| Error::MalformedToken {
            reason: "invalid base64 in header segment".to_string(),
        })?;
    let header: Header =
        serde_json::from_slice(&header_bytes).map_err(|_| Error::MalformedToken {
            reason: "header is not valid JSON".to_string(),
        })?;
    if header.alg != "dir" || header.enc != "A256GCM" {
        return Err(Error::MalformedToken {
            reason: format!("unsupported alg/enc: {}/{}", header.alg, header.enc),
        });
    }

    let iv_bytes = b64()
        .decode(segments[2])
        .map_err(|_| Error::MalformedToken {
            reason: "invalid base64 in IV segment".to_string(),
        })?;
    if iv_bytes.len() != IV_LEN {
        return Err(Error::MalformedToken {
            reason: format!("IV must be {IV_LEN} bytes, got {}", iv_bytes.len()),
        });
    }
    let ciphertext = b64()
        .decode(segments[3])
        .map_err(|_| Error::MalformedToken {
            reason: "invalid base64 in ciphertext segment".to_string(),
        })?;
    let tag = b64()
        .decode(segments[4])
        .map_err(|_| Error::MalformedToken {
            reason: "invalid base64 in tag segment".to_string(),
        })?;
    if tag.len() != TAG_LEN {
        return Err(Error::MalformedToken {
            reason: format!("tag must be {TAG_LEN} bytes, got {}", tag.len()),
        });
    }

    let mut sealed = Vec::with_capacity(ciphertext.len() + tag.len());
    sealed.extend_from_slice(&ciphertext);
    sealed.extend_from_slice(&tag);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Nonce::from_slice(&iv_bytes);
    let plaintext = cipher
        .decrypt(nonce, sealed.as_slice())
        .map_err(|_| Error::DecryptionFailed)?;

    let claims: Claims = serde_json::from_slice(&plaintext).map_err(|e| Error::MalformedClaims {
        reason: e.to_string(),
    })?;
    claims.validate_shape()?;
    Ok(claims)
}

/// Parses only the header segment of `token` and returns its `kid`, if
/// present, without touching the ciphertext.
pub fn extract_kid(token: &str) -> Result<Option<String>> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 5 {
        return Err(Error::MalformedToken {
            reason: format!("expected 5 segments, got {}", segments.len()),
        });
    }
    let header_bytes = b64()
        .decode(segments[0])
        .map_err(|_| Error::MalformedToken {
            reason: "invalid base64 in header segment".to_string(),
        })?;
    let header: Header =
        serde_json::from_slice(&header_bytes).map_err(|_| Error::MalformedToken {
            reason: "header is not valid JSON".to_string(),
        })?;
    Ok(header.kid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultkeeper_core::claims::UsageLimit;

    fn sample_claims() -> Claims {
        Claims {
            jti: "jti-1".to_string(),
            iat: 1000,
            exp: 2000,
            sub: "api-key".to_string(),
            exe: "dev".to_string(),
            usage_limit: UsageLimit::Unlimited,
            tid: 3,
            bkd: "memory".to_string(),
            val: "sk-live-abc".to_string(),
            reference: "api-key".to_string(),
        }
    }

    fn key(seed: u8) -> [u8; 32] {
        [seed; 32]
    }

    #[test]
    fn roundtrip() {
        let claims = sample_claims();
        let token = encrypt(&key(1), Some("k-1"), &claims).unwrap();
        let decoded = decrypt(&key(1), &token).unwrap();
        assert_eq!(decoded.jti, claims.jti);
        assert_eq!(decoded.val, claims.val);
    }

    #[test]
    fn wrong_key_fails() {
        let claims = sample_claims();
        let token = encrypt(&key(1), Some("k-1"), &claims).unwrap();
        let err = decrypt(&key(2), &token).unwrap_err();
        assert!(matches!(err, Error::DecryptionFailed));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let claims = sample_claims();
        let token = encrypt(&key(1), Some("k-1"), &claims).unwrap();
        let mut segments: Vec<String> = token.split('.').map(|s| s.to_string()).collect();
        let mut bytes = b64().decode(&segments[3]).unwrap();
        bytes[0] ^= 0xFF;
        segments[3] = b64().encode(bytes);
        let tampered = segments.join(".");
        let err = decrypt(&key(1), &tampered).unwrap_err();
        assert!(matches!(err, Error::DecryptionFailed));
    }

    #[test]
    fn tampered_tag_fails() {
        let claims = sample_claims();
        let token = encrypt(&key(1), Some("k-1"), &claims).unwrap();
        let mut segments: Vec<String> = token.split('.').map(|s| s.to_string()).collect();
        let mut bytes = b64().decode(&segments[4]).unwrap();
        bytes[0] ^= 0xFF;
        segments[4] = b64().encode(bytes);
        let tampered = segments.join(".");
        let err = decrypt(&key(1), &tampered).unwrap_err();
        assert!(matches!(err, Error::DecryptionFailed));
    }

    #[test]
    fn extract_kid_without_decrypting() {
        let claims = sample_claims();
        let token = encrypt(&key(1), Some("k-42"), &claims).unwrap();
        assert_eq!(extract_kid(&token).unwrap(), Some("k-42".to_string()));
    }

    #[test]
    fn extract_kid_wrong_segment_count() {
        let err = extract_kid("a.b.c").unwrap_err();
        assert!(matches!(err, Error::MalformedToken { .. }));
    }

    #[test]
    fn extract_kid_none_when_absent() {
        let claims = sample_claims();
        let token = encrypt(&key(1), None, &claims).unwrap();
        assert_eq!(extract_kid(&token).unwrap(), None);
    }
}
