use async_trait::async_trait;
use axum::http::Method;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;

use super::{validate_path, ObjectStore, ObjectStoreError, StoredObject, UrlSigner};

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectMeta {
    content_type: String,
}

/// Object store on the local filesystem.
///
/// Each object lives at `<root>/<path>` with its content type recorded in a
/// `<path>.meta.json` sidecar. Both files are written to a uniquely named
/// temp file and renamed into place, the sidecar first; an object without
/// its sidecar reads as missing.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
    signer: UrlSigner,
}

impl LocalObjectStore {
    pub async fn open(
        root: impl Into<PathBuf>,
        signer: UrlSigner,
    ) -> Result<Self, ObjectStoreError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root, signer })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn locate(&self, path: &str) -> Result<(PathBuf, PathBuf), ObjectStoreError> {
        validate_path(path)?;
        Ok((
            self.root.join(path),
            self.root.join(format!("{path}.meta.json")),
        ))
    }
}

/// Write `bytes` to a fresh temp file in `dir`, then rename it over `target`
fn replace_file(dir: &Path, target: &Path, bytes: &[u8]) -> Result<(), ObjectStoreError> {
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(target).map_err(|e| e.error)?;
    Ok(())
}

async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, ObjectStoreError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put_object(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        let (data_path, meta_path) = self.locate(path)?;
        let meta = serde_json::to_vec(&ObjectMeta {
            content_type: content_type.to_string(),
        })?;

        let size = bytes.len();
        let root = self.root.clone();

        tokio::task::spawn_blocking(move || {
            replace_file(&root, &meta_path, &meta)?;
            replace_file(&root, &data_path, &bytes)
        })
        .await
        .map_err(|e| ObjectStoreError::Unavailable(format!("write task failed: {e}")))??;

        tracing::debug!(path, size, content_type, "Stored object");
        Ok(())
    }

    async fn get_object(&self, path: &str) -> Result<Option<StoredObject>, ObjectStoreError> {
        let (data_path, meta_path) = self.locate(path)?;

        let Some(bytes) = read_optional(&data_path).await? else {
            return Ok(None);
        };
        let Some(meta) = read_optional(&meta_path).await? else {
            return Ok(None);
        };
        let meta: ObjectMeta = serde_json::from_slice(&meta)?;

        Ok(Some(StoredObject {
            bytes,
            content_type: meta.content_type,
        }))
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
