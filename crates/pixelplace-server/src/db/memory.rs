use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use pixelplace_core::{Canvas, CanvasStatus, CellCoord, Pixel};
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use tokio::sync::RwLock;

use super::{CanvasStore, PixelStream, ScanCursor, StoreError};

const DEFAULT_PAGE_SIZE: u32 = 1_000;

/// In-process store used for tests and `STORE_BACKEND=memory`.
///
/// Pixels are keyed by `(y, x)` so iteration is already row-major. Scans
/// read one page per lock acquisition, like the keyset pages of the
/// Postgres store.
pub struct MemoryStore {
    canvases: RwLock<HashMap<String, Canvas>>,
    pixels: RwLock<HashMap<String, BTreeMap<(i64, i64), Pixel>>>,
    actions: RwLock<HashMap<(String, String), DateTime<Utc>>>,
    page_size: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_size(page_size: u32) -> Self {
        Self {
            canvases: RwLock::default(),
            pixels: RwLock::default(),
            actions: RwLock::default(),
            page_size: page_size.max(1) as usize,
        }
    }

    /// Number of stored pixels for a canvas
    pub async fn pixel_count(&self, canvas_id: &str) -> usize {
        self.pixels
            .read()
            .await
            .get(canvas_id)
            .map_or(0, BTreeMap::len)
    }

    pub async fn pixel_at(&self, canvas_id: &str, x: i64, y: i64) -> Option<Pixel> {
        self.pixels
            .read()
            .await
            .get(canvas_id)
            .and_then(|cells| cells.get(&(y, x)).cloned())
    }
}

#[async_trait]
impl CanvasStore for MemoryStore {
    async fn get_canvas(&self, canvas_id: &str) -> Result<Option<Canvas>, StoreError> {
        Ok(self.canvases.read().await.get(canvas_id).cloned())
    }

    async fn put_canvas(&self, canvas: &Canvas) -> Result<(), StoreError> {
        self.canvases
            .write()
            .await
            .insert(canvas.id.clone(), canvas.clone());
        Ok(())
    }

    async fn set_canvas_status(
        &self,
        canvas_id: &str,
        status: CanvasStatus,
    ) -> Result<bool, StoreError> {
        let mut canvases = self.canvases.write().await;
        match canvases.get_mut(canvas_id) {
            Some(canvas) => {
                canvas.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn put_pixel(&self, canvas_id: &str, pixel: &Pixel) -> Result<(), StoreError> {
        self.pixels
            .write()
            .await
            .entry(canvas_id.to_string())
            .or_default()
            .insert((pixel.y, pixel.x), pixel.clone());
        Ok(())
    }

    fn scan_pixels<'a>(
        &'a self,
        canvas_id: &'a str,
        width: u32,
        height: u32,
        after: Option<CellCoord>,
    ) -> PixelStream<'a> {
        let page_size = self.page_size;
        let cursor = ScanCursor {
            after: after.map(|c| (c.y, c.x)),
            done: false,
        };

        stream::try_unfold(cursor, move |cursor| async move {
            if cursor.done {
                return Ok(None);
            }

            let lower = cursor.after.map_or(Bound::Unbounded, Bound::Excluded);
            let page: Vec<Pixel> = {
                let pixels = self.pixels.read().await;
                pixels
                    .get(canvas_id)
                    .into_iter()
                    .flat_map(|cells| cells.range((lower, Bound::Unbounded)))
                    .map(|(_, pixel)| pixel)
                    .filter(|pixel| pixel.coord().is_within(width, height))
                    .take(page_size)
                    .cloned()
                    .collect()
            };

            let next = ScanCursor {
                after: page.last().map(|p| (p.y, p.x)).or(cursor.after),
                done: page.len() < page_size,
            };
            let page: Vec<Result<Pixel, StoreError>> = page.into_iter().map(Ok).collect();

            Ok::<_, StoreError>(Some((page, next)))
        })
        .map_ok(stream::iter)
        .try_flatten()
        .boxed()
    }

    async fn delete_pixels(&self, canvas_id: &str) -> Result<u64, StoreError> {
        let removed = self.pixels.write().await.remove(canvas_id);
        Ok(removed.map_or(0, |cells| cells.len() as u64))
    }

    async fn last_action(
        &self,
        category: &str,
        writer_id: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let key = (category.to_string(), writer_id.to_string());
        Ok(self.actions.read().await.get(&key).copied())
    }

    async fn record_action(
        &self,
        category: &str,
        writer_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.actions
            .write()
            .await
            .insert((category.to_string(), writer_id.to_string()), at);
        Ok(())
    }
}
