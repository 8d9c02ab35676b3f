use async_trait::async_trait;
use axum::http::Method;
use chrono::Utc;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

use super::{validate_path, ObjectStore, ObjectStoreError, StoredObject, UrlSigner};

/// Object store kept in process memory
#[derive(Debug)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<String, StoredObject>>,
    signer: UrlSigner,
}

impl MemoryObjectStore {
    pub fn new(signer: UrlSigner) -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            signer,
        }
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_object(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        validate_path(path)?;
        self.objects.write().await.insert(
            path.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn get_object(&self, path: &str) -> Result<Option<StoredObject>, ObjectStoreError> {
        validate_path(path)?;
        Ok(self.objects.read().await.get(path).cloned())
    }

    fn signed_url(
        &self,
        path: &str,
        method: Method,
        expiry: Duration,
        content_type: &str,
    ) -> Result<String, ObjectStoreError> {
        validate_path(path)?;
        self.signer
            .sign(path, &method, expiry, content_type, Utc::now())
            .map_err(ObjectStoreError::Signing)
    }
}
