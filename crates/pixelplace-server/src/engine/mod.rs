//! Draw and snapshot orchestration on top of the store abstractions.

pub mod publisher;
pub mod rate_limit;
pub mod session;
pub mod snapshot;
pub mod writer;

use pixelplace_core::{Cooldown, Rasterizer};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::blob::ObjectStore;
use crate::config::{Config, StoreConfig};
use crate::db::{CanvasStore, StoreError};
use crate::error::AppError;
use crate::feed::PixelFeed;

pub use publisher::{encode_pixel_dump, PublishedSnapshot, SnapshotPublisher};
pub use rate_limit::RateLimiter;
pub use session::{SessionManager, StartCanvas};
pub use snapshot::{Snapshot, SnapshotAssembler};
pub use writer::{CommittedPixel, DrawRequest, PixelWriter};

/// First pause between two attempts of an idempotent write
const INITIAL_BACKOFF: Duration = Duration::from_millis(50);

/// Outcome of a published snapshot
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotReport {
    pub canvas_id: String,
    pub width: u32,
    pub height: u32,
    pub drawn: usize,
    pub skipped: usize,
    #[serde(flatten)]
    pub urls: PublishedSnapshot,
}

/// The draw path, the snapshot pipeline and session management wired to
/// one pair of stores
pub struct Engine {
    pub writer: PixelWriter,
    pub sessions: SessionManager,
    assembler: SnapshotAssembler,
    rasterizer: Rasterizer,
    publisher: SnapshotPublisher,
}

impl Engine {
    pub fn new(
        config: &Config,
        store: Arc<dyn CanvasStore>,
        objects: Arc<dyn ObjectStore>,
        feed: Arc<PixelFeed>,
    ) -> Self {
        let limiter = RateLimiter::new(
            store.clone(),
            Cooldown::new(config.draw.cooldown),
            config.draw.on_lookup_error,
            config.store.clone(),
        );

        Self {
            writer: PixelWriter::new(store.clone(), limiter, feed, config.store.clone()),
            sessions: SessionManager::new(
                store.clone(),
                config.max_canvas_side,
                config.store.clone(),
            ),
            assembler: SnapshotAssembler::new(
                store,
                config.snapshot.background,
                config.max_canvas_side,
                config.store.clone(),
            ),
            rasterizer: Rasterizer::new(config.snapshot.max_dimension)
                .with_upscale(config.snapshot.upscale),
            publisher: SnapshotPublisher::new(
                objects,
                config.snapshot.url_ttl,
                config.store.timeout,
            ),
        }
    }

    /// Assemble, render and publish the current state of a canvas
    pub async fn snapshot(
        &self,
        canvas_id: &str,
        cancel: &CancellationToken,
    ) -> Result<SnapshotReport, AppError> {
        let Snapshot {
            canvas,
            grid,
            skipped,
        } = self.assembler.assemble(canvas_id, cancel).await?;

        // Both encodings are CPU bound; keep them off the async workers
        let rasterizer = self.rasterizer;
        let (drawn, png, dump) = tokio::task::spawn_blocking(move || {
            let png = rasterizer.encode(&grid);
            let dump = encode_pixel_dump(grid.pixels());
            (grid.drawn_count(), png, dump)
        })
        .await
        .map_err(|e| AppError::Publish(format!("render task failed: {e}")))?;
        let png = png?;
        let dump = dump.map_err(|e| AppError::Publish(format!("data: {e}")))?;

        let urls = self.publisher.publish(&canvas.id, png, dump).await?;

        Ok(SnapshotReport {
            canvas_id: canvas.id,
            width: canvas.width,
            height: canvas.height,
            drawn,
            skipped,
            urls,
        })
    }
}

/// Run a store call, failing with [`StoreError::Timeout`] once `limit` elapses
pub async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}

/// Run an idempotent store write with a timeout per attempt, retrying
/// transient failures with exponential backoff.
pub async fn retry_idempotent<T, F, Fut>(
    config: &StoreConfig,
    operation: &'static str,
    mut call: F,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut attempt = 1;
    let mut backoff = INITIAL_BACKOFF;

    loop {
        match bounded(config.timeout, call()).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < config.write_attempts => {
                tracing::warn!(operation, attempt, error = %e, "Store write failed, retrying");
                tokio::time::sleep(backoff).await;
                backoff *= 2;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Store doubles shared by the engine and API tests.

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use pixelplace_core::{Canvas, CanvasStatus, CellCoord, Pixel};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use crate::config::StoreConfig;
    use crate::db::{CanvasStore, MemoryStore, PixelStream, StoreError};

    pub fn quick_store_config() -> StoreConfig {
        StoreConfig {
            timeout: Duration::from_millis(200),
            write_attempts: 3,
            page_size: 2,
        }
    }

    /// Which calls of a [`FlakyStore`] fail
    #[derive(Debug, Clone, Copy, Default)]
    pub struct Faults {
        pub last_action: bool,
        pub record_action: bool,
        /// Number of leading `put_pixel` calls that fail transiently
        pub put_pixel_failures: u32,
    }

    /// A [`MemoryStore`] with injectable failures
    #[derive(Default)]
    pub struct FlakyStore {
        pub inner: MemoryStore,
        pub faults: Faults,
        pub put_pixel_calls: AtomicU32,
    }

    impl FlakyStore {
        pub fn new(faults: Faults) -> Self {
            Self {
                faults,
                ..Self::default()
            }
        }
    }

    fn down() -> StoreError {
        StoreError::Unavailable("injected failure".to_string())
    }

    #[async_trait]
    impl CanvasStore for FlakyStore {
        async fn get_canvas(&self, canvas_id: &str) -> Result<Option<Canvas>, StoreError> {
            self.inner.get_canvas(canvas_id).await
        }

        async fn put_canvas(&self, canvas: &Canvas) -> Result<(), StoreError> {
            self.inner.put_canvas(canvas).await
        }

        async fn set_canvas_status(
            &self,
            canvas_id: &str,
            status: CanvasStatus,
        ) -> Result<bool, StoreError> {
            self.inner.set_canvas_status(canvas_id, status).await
        }

        async fn put_pixel(&self, canvas_id: &str, pixel: &Pixel) -> Result<(), StoreError> {
            let call = self.put_pixel_calls.fetch_add(1, Ordering::SeqCst);
            if call < self.faults.put_pixel_failures {
                return Err(down());
            }
            self.inner.put_pixel(canvas_id, pixel).await
        }

        fn scan_pixels<'a>(
            &'a self,
            canvas_id: &'a str,
            width: u32,
            height: u32,
            after: Option<CellCoord>,
        ) -> PixelStream<'a> {
            self.inner.scan_pixels(canvas_id, width, height, after)
        }

        async fn delete_pixels(&self, canvas_id: &str) -> Result<u64, StoreError> {
            self.inner.delete_pixels(canvas_id).await
        }

        async fn last_action(
            &self,
            category: &str,
            writer_id: &str,
        ) -> Result<Option<DateTime<Utc>>, StoreError> {
            if self.faults.last_action {
                return Err(down());
            }
            self.inner.last_action(category, writer_id).await
        }

        async fn record_action(
            &self,
            category: &str,
            writer_id: &str,
            at: DateTime<Utc>,
        ) -> Result<(), StoreError> {
            if self.faults.record_action {
                return Err(down());
            }
            self.inner.record_action(category, writer_id, at).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::quick_store_config;
    use super::*;
    use crate::blob::{MemoryObjectStore, ObjectStoreError, StoredObject, UrlSigner};
    use crate::db::MemoryStore;
    use async_trait::async_trait;
    use axum::http::Method;
    use chrono::Utc;
    use pixelplace_core::{Canvas, Color};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn memory_objects() -> Arc<MemoryObjectStore> {
        Arc::new(MemoryObjectStore::new(UrlSigner::new(
            "secret",
            "http://localhost:3000",
        )))
    }

    async fn engine_over(upscale: bool, objects: Arc<dyn ObjectStore>) -> Engine {
        let mut config = Config::in_memory();
        config.store = quick_store_config();
        config.snapshot.upscale = upscale;

        let store = Arc::new(MemoryStore::new());
        store
            .put_canvas(&Canvas::new("c1", "admin", "Test", 2, 2, Utc::now()))
            .await
            .unwrap();
        Engine::new(&config, store, objects, Arc::new(PixelFeed::new()))
    }

    async fn engine(upscale: bool) -> (Arc<MemoryObjectStore>, Engine) {
        let objects = memory_objects();
        let engine = engine_over(upscale, objects.clone()).await;
        (objects, engine)
    }

    /// An object store whose uploads never finish
    struct StalledObjects(Arc<MemoryObjectStore>);

    #[async_trait]
    impl ObjectStore for StalledObjects {
        async fn put_object(
            &self,
            _path: &str,
            _bytes: Vec<u8>,
            _content_type: &str,
        ) -> Result<(), ObjectStoreError> {
            std::future::pending().await
        }

        async fn get_object(&self, path: &str) -> Result<Option<StoredObject>, ObjectStoreError> {
            self.0.get_object(path).await
        }

        fn signed_url(
            &self,
            path: &str,
            method: Method,
            expiry: Duration,
            content_type: &str,
        ) -> Result<String, ObjectStoreError> {
            self.0.signed_url(path, method, expiry, content_type)
        }
    }

    fn draw(x: i64, y: i64, color: Color) -> DrawRequest {
        DrawRequest {
            canvas_id: "c1".to_string(),
            x,
            y,
            color,
            writer_id: "alice".to_string(),
        }
    }

    #[tokio::test]
    async fn test_draw_then_snapshot() {
        let (objects, engine) = engine(false).await;
        engine
            .writer
            .write(&draw(0, 0, Color::RED), Utc::now())
            .await
            .unwrap();

        let report = engine
            .snapshot("c1", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!((report.width, report.height, report.drawn), (2, 2, 1));
        assert!(report.urls.image_url.contains("canvas_c1.png"));

        let png = objects.get_object("canvas_c1.png").await.unwrap().unwrap();
        let image = image::load_from_memory_with_format(&png.bytes, image::ImageFormat::Png)
            .unwrap()
            .to_rgb8();
        assert_eq!(image.dimensions(), (2, 2));
        assert_eq!(image.get_pixel(0, 0).0, [255, 0, 0]);
        assert_eq!(image.get_pixel(1, 0).0, [255, 255, 255]);
        assert_eq!(image.get_pixel(1, 1).0, [255, 255, 255]);
    }

    #[tokio::test]
    async fn test_rejected_draw_leaves_snapshot_unchanged() {
        let (_, engine) = engine(true).await;
        let cancel = CancellationToken::new();
        let before = engine.snapshot("c1", &cancel).await.unwrap();

        let err = engine
            .writer
            .write(&draw(5, 5, Color::BLACK), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::OutOfBounds { .. }));

        let after = engine.snapshot("c1", &cancel).await.unwrap();
        assert_eq!(after.drawn, 0);
        assert_eq!(before.drawn, after.drawn);
    }

    #[tokio::test]
    async fn test_snapshot_fails_when_uploads_stall() {
        let engine = engine_over(false, Arc::new(StalledObjects(memory_objects()))).await;

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            engine.snapshot("c1", &CancellationToken::new()),
        )
        .await
        .expect("snapshot must not hang on a stalled object store");

        match result {
            Err(AppError::Publish(message)) => {
                assert!(message.contains("image: "));
                assert!(message.contains("data: "));
            }
            other => panic!("expected a publish failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_bounded_times_out() {
        let result: Result<(), _> = bounded(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(StoreError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = retry_idempotent(&quick_store_config(), "test", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(StoreError::Unavailable("down".into()))
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_idempotent(&quick_store_config(), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Unavailable("down".into()))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_skips_permanent_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_idempotent(&quick_store_config(), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::decode("pixel", "color", "bad"))
        })
        .await;

        assert!(matches!(result, Err(StoreError::Decode { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
