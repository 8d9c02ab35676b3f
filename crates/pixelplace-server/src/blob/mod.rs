//! Blob storage for published snapshots.

pub mod local;
pub mod memory;
pub mod signing;

use async_trait::async_trait;
use axum::http::Method;
use std::time::Duration;
use thiserror::Error;

pub use local::LocalObjectStore;
pub use memory::MemoryObjectStore;
pub use signing::{SignatureError, UrlSigner};

/// Failures of the object store
#[derive(Error, Debug)]
pub enum ObjectStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid object path: {0:?}")]
    InvalidPath(String),

    #[error("Metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Object store unavailable: {0}")]
    Unavailable(String),
}

/// An object read back from the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write (or replace) the object at `path`
    async fn put_object(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ObjectStoreError>;

    async fn get_object(&self, path: &str) -> Result<Option<StoredObject>, ObjectStoreError>;

    /// URL granting `method` on `path` until `expiry` from now
    fn signed_url(
        &self,
        path: &str,
        method: Method,
        expiry: Duration,
        content_type: &str,
    ) -> Result<String, ObjectStoreError>;
}

/// Object paths are flat, relative names: no separators, no parent references
pub fn validate_path(path: &str) -> Result<(), ObjectStoreError> {
    let ok = !path.is_empty()
        && path.len() <= 255
        && path != "."
        && path != ".."
        && path
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));

    if ok {
        Ok(())
    } else {
        Err(ObjectStoreError::InvalidPath(path.to_string()))
    }
}
