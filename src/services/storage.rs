//! Signed URLs for the external object store.
//!
//! Files never pass through this service. Downloads and uploads go straight
//! to the object store with a URL carrying an expiry timestamp and an
//! HMAC-SHA256 signature over `METHOD\npath\nexpires`, keyed with
//! `STORAGE_SIGNING_KEY`.

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;

use crate::config::StorageConfig;
use crate::error::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

/// Prefix for audio feedback uploaded through a shared link.
pub const FEEDBACK_AUDIO_PREFIX: &str = "feedback-audio";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignedMethod {
    Get,
    Put,
}

impl SignedMethod {
    fn as_str(self) -> &'static str {
        match self {
            SignedMethod::Get => "GET",
            SignedMethod::Put => "PUT",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SignedUrl {
    pub path: String,
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct StorageSigner {
    public_url: String,
    key: Vec<u8>,
    ttl: Duration,
}

impl std::fmt::Debug for StorageSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageSigner")
            .field("public_url", &self.public_url)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl StorageSigner {
    /// Build a signer when both the public URL and the signing key are set.
    pub fn from_config(config: &StorageConfig) -> Option<Self> {
        match (&config.public_url, &config.signing_key) {
            (Some(url), Some(key)) => Some(Self::new(url, key.as_bytes(), config.url_ttl_seconds)),
            _ => None,
        }
    }

    pub fn new(public_url: &str, key: &[u8], ttl_seconds: i64) -> Self {
        Self {
            public_url: public_url.trim_end_matches('/').to_string(),
            key: key.to_vec(),
            ttl: Duration::seconds(ttl_seconds.max(1)),
        }
    }

    pub fn sign(
        &self,
        method: SignedMethod,
        path: &str,
        now: DateTime<Utc>,
    ) -> AppResult<SignedUrl> {
        validate_object_path(path)?;

        let expires_at = now + self.ttl;
        let expires = expires_at.timestamp();
        let signature = self.signature(method, path, expires)?;

        Ok(SignedUrl {
            path: path.to_string(),
            url: format!(
                "{}/{}?expires={}&signature={}",
                self.public_url, path, expires, signature
            ),
            expires_at,
        })
    }

    /// Check a signature the way the object store does.
    pub fn verify(
        &self,
        method: SignedMethod,
        path: &str,
        expires: i64,
        signature: &str,
        now: DateTime<Utc>,
    ) -> bool {
        if expires <= now.timestamp() {
            return false;
        }

        let Ok(provided) = hex::decode(signature) else {
            return false;
        };

        let Ok(mut mac) = HmacSha256::new_from_slice(&self.key) else {
            return false;
        };
        mac.update(Self::string_to_sign(method, path, expires).as_bytes());
        mac.verify_slice(&provided).is_ok()
    }

    fn signature(&self, method: SignedMethod, path: &str, expires: i64) -> AppResult<String> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to initialize HMAC: {}", e)))?;
        mac.update(Self::string_to_sign(method, path, expires).as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn string_to_sign(method: SignedMethod, path: &str, expires: i64) -> String {
        format!("{}\n{}\n{}", method.as_str(), path, expires)
    }
}

/// Object keys are relative, slash-separated and free of `.`/`..` segments.
pub fn validate_object_path(path: &str) -> AppResult<()> {
    let invalid = path.is_empty()
        || path.starts_with('/')
        || path.contains('\\')
        || path.contains("//")
        || path.split('/').any(|seg| seg == "." || seg == "..")
        || path.chars().any(|c| c.is_control() || c == '?' || c == '#');

    if invalid {
        return Err(AppError::Validation(crate::i18n::t("validation.file_path")));
    }
    Ok(())
}

/// Fresh object key for an audio feedback recording on an artwork.
pub fn feedback_audio_path(artwork_id: &str) -> String {
    format!(
        "{}/{}/{}.webm",
        FEEDBACK_AUDIO_PREFIX,
        artwork_id,
        uuid::Uuid::new_v4()
    )
}

/// Whether `path` is an audio upload slot belonging to `artwork_id`.
pub fn is_feedback_audio_path(path: &str, artwork_id: &str) -> bool {
    let prefix = format!("{}/{}/", FEEDBACK_AUDIO_PREFIX, artwork_id);
    validate_object_path(path).is_ok()
        && path.starts_with(&prefix)
        && path.len() > prefix.len()
        && !path[prefix.len()..].contains('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> StorageSigner {
        StorageSigner::new("https://cdn.example.com/files/", b"secret", 600)
    }

    #[test]
    fn signed_url_verifies_until_expiry() {
        let now = Utc::now();
        let signed = signer()
            .sign(SignedMethod::Get, "artworks/a1/v1.png", now)
            .unwrap();

        assert!(signed
            .url
            .starts_with("https://cdn.example.com/files/artworks/a1/v1.png?expires="));

        let sig = signed.url.split("signature=").nth(1).unwrap();
        let expires = signed.expires_at.timestamp();
        let s = signer();

        assert!(s.verify(SignedMethod::Get, "artworks/a1/v1.png", expires, sig, now));
        // Signature is bound to the method, the path and the expiry.
        assert!(!s.verify(SignedMethod::Put, "artworks/a1/v1.png", expires, sig, now));
        assert!(!s.verify(SignedMethod::Get, "artworks/a1/v2.png", expires, sig, now));
        assert!(!s.verify(SignedMethod::Get, "artworks/a1/v1.png", expires + 1, sig, now));
        assert!(!s.verify(
            SignedMethod::Get,
            "artworks/a1/v1.png",
            expires,
            sig,
            now + Duration::seconds(601)
        ));
    }

    #[test]
    fn object_paths_are_validated() {
        assert!(validate_object_path("artworks/a1/v1.png").is_ok());
        assert!(validate_object_path("").is_err());
        assert!(validate_object_path("/etc/passwd").is_err());
        assert!(validate_object_path("artworks/../secrets").is_err());
        assert!(validate_object_path("a//b").is_err());
        assert!(validate_object_path("a/b?x=1").is_err());
    }

    #[test]
    fn feedback_audio_paths_are_scoped_to_the_artwork() {
        let path = feedback_audio_path("art-1");
        assert!(is_feedback_audio_path(&path, "art-1"));
        assert!(!is_feedback_audio_path(&path, "art-2"));
        assert!(!is_feedback_audio_path("feedback-audio/art-1/", "art-1"));
        assert!(!is_feedback_audio_path("feedback-audio/art-1/x/y.webm", "art-1"));
        assert!(!is_feedback_audio_path("feedback-audio/art-1/../art-2/x.webm", "art-1"));
    }
}
