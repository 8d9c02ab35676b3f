use axum::http::Method;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::Duration;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Why a signed URL was refused
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SignatureError {
    #[error("URL expired")]
    Expired,

    #[error("signature mismatch")]
    Mismatch,

    #[error("malformed signature")]
    Malformed,
}

/// Issues and checks time-bounded object URLs.
///
/// The signature is HMAC-SHA256 over method, path, expiry and content type,
/// so a URL cannot be reused for another object or past its expiry.
#[derive(Clone)]
pub struct UrlSigner {
    secret: Vec<u8>,
    base_url: String,
}

impl std::fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl UrlSigner {
    pub fn new(secret: impl Into<Vec<u8>>, base_url: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn mac(
        &self,
        method: &Method,
        path: &str,
        expires: i64,
        content_type: &str,
    ) -> Result<HmacSha256, String> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).map_err(|e| e.to_string())?;
        let message = format!("{}\n{}\n{}\n{}", method.as_str(), path, expires, content_type);
        mac.update(message.as_bytes());
        Ok(mac)
    }

    /// Hex signature for the given request parameters
    pub fn signature(
        &self,
        method: &Method,
        path: &str,
        expires: i64,
        content_type: &str,
    ) -> Result<String, String> {
        let mac = self.mac(method, path, expires, content_type)?;
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Full URL for `path`, valid for `expiry` from `now`
    pub fn sign(
        &self,
        path: &str,
        method: &Method,
        expiry: Duration,
        content_type: &str,
        now: DateTime<Utc>,
    ) -> Result<String, String> {
        let expiry = chrono::TimeDelta::from_std(expiry).map_err(|e| e.to_string())?;
        let expires = (now + expiry).timestamp();
        let signature = self.signature(method, path, expires, content_type)?;
        Ok(format!(
            "{}/objects/{}?expires={}&signature={}",
            self.base_url, path, expires, signature
        ))
    }

    /// Check a presented signature, in constant time
    pub fn verify(
        &self,
        method: &Method,
        path: &str,
        expires: i64,
        content_type: &str,
        signature: &str,
        now: DateTime<Utc>,
    ) -> Result<(), SignatureError> {
        if now.timestamp() > expires {
            return Err(SignatureError::Expired);
        }
        let presented = hex::decode(signature).map_err(|_| SignatureError::Malformed)?;
        let mac = self
            .mac(method, path, expires, content_type)
            .map_err(|_| SignatureError::Malformed)?;
        mac.verify_slice(&presented)
            .map_err(|_| SignatureError::Mismatch)
    }
}
