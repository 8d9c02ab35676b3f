use axum::http::Method;
use flate2::write::GzEncoder;
use flate2::Compression;
use pixelplace_core::Pixel;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::blob::{ObjectStore, ObjectStoreError};
use crate::error::AppError;

pub const PNG_CONTENT_TYPE: &str = "image/png";
pub const GZIP_CONTENT_TYPE: &str = "application/gzip";

pub fn image_path(canvas_id: &str) -> String {
    format!("canvas_{canvas_id}.png")
}

pub fn data_path(canvas_id: &str) -> String {
    format!("canvas_{canvas_id}.json.gz")
}

/// Gzip-compressed JSON array of the pixels
pub fn encode_pixel_dump(pixels: &[Pixel]) -> Result<Vec<u8>, ObjectStoreError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    serde_json::to_writer(&mut encoder, pixels)?;
    Ok(encoder.finish()?)
}

/// Signed download links of a published snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedSnapshot {
    pub image_url: String,
    pub data_url: String,
}

/// Which parts of a publish failed
#[derive(Debug, Default)]
pub struct PublishFailure {
    pub image: Option<ObjectStoreError>,
    pub data: Option<ObjectStoreError>,
}

impl fmt::Display for PublishFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = [("image", &self.image), ("data", &self.data)]
            .into_iter()
            .filter_map(|(part, error)| error.as_ref().map(|e| format!("{part}: {e}")))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

impl From<PublishFailure> for AppError {
    fn from(failure: PublishFailure) -> Self {
        AppError::Publish(failure.to_string())
    }
}

/// Uploads the rendered image and pixel dump of a snapshot
pub struct SnapshotPublisher {
    objects: Arc<dyn ObjectStore>,
    url_ttl: Duration,
    /// Limit on each object upload
    timeout: Duration,
}

impl SnapshotPublisher {
    pub fn new(objects: Arc<dyn ObjectStore>, url_ttl: Duration, timeout: Duration) -> Self {
        Self {
            objects,
            url_ttl,
            timeout,
        }
    }

    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, ObjectStoreError> {
        let size = bytes.len();
        tokio::time::timeout(
            self.timeout,
            self.objects.put_object(path, bytes, content_type),
        )
        .await
        .map_err(|_| {
            ObjectStoreError::Unavailable(format!("upload timed out after {:?}", self.timeout))
        })??;
        tracing::debug!(path, size, "Uploaded snapshot object");
        self.objects
            .signed_url(path, Method::GET, self.url_ttl, content_type)
    }

    /// Upload the PNG and the encoded pixel dump concurrently. Each part is
    /// attempted regardless of the other; any failure is reported per part.
    pub async fn publish(
        &self,
        canvas_id: &str,
        image: Vec<u8>,
        dump: Vec<u8>,
    ) -> Result<PublishedSnapshot, PublishFailure> {
        let image_path = image_path(canvas_id);
        let data_path = data_path(canvas_id);

        let (image_url, data_url) = tokio::join!(
            self.upload(&image_path, image, PNG_CONTENT_TYPE),
            self.upload(&data_path, dump, GZIP_CONTENT_TYPE),
        );

        match (image_url, data_url) {
            (Ok(image_url), Ok(data_url)) => {
                tracing::info!(canvas_id, "Snapshot published");
                Ok(PublishedSnapshot {
                    image_url,
                    data_url,
                })
            }
            (image, data) => {
                let failure = PublishFailure {
                    image: image.err(),
                    data: data.err(),
                };
                tracing::warn!(canvas_id, %failure, "Snapshot publish failed");
                Err(failure)
            }
        }
    }
}
