use futures::StreamExt;
use pixelplace_core::{Canvas, CellCoord, Color, DenseGrid};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::bounded;
use crate::config::StoreConfig;
use crate::db::{CanvasStore, StoreError};
use crate::error::AppError;

/// A canvas reconstructed from its stored pixels
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub canvas: Canvas,
    pub grid: DenseGrid,
    /// Stored records dropped for lying outside the canvas
    pub skipped: usize,
}

/// Rebuilds the dense grid of a canvas from the sparse pixel records
pub struct SnapshotAssembler {
    store: Arc<dyn CanvasStore>,
    background: Color,
    max_side: u32,
    store_config: StoreConfig,
}

impl SnapshotAssembler {
    pub fn new(
        store: Arc<dyn CanvasStore>,
        background: Color,
        max_side: u32,
        store_config: StoreConfig,
    ) -> Self {
        Self {
            store,
            background,
            max_side,
            store_config,
        }
    }

    /// Assemble the full grid of `canvas_id`.
    ///
    /// Each page fetch is bounded by the store timeout. A transient failure
    /// mid-scan resumes after the last record seen, up to the configured
    /// number of attempts. `cancel` is checked between records. Canvases
    /// with a side above the configured limit are refused before any grid
    /// is allocated.
    pub async fn assemble(
        &self,
        canvas_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Snapshot, AppError> {
        let timeout = self.store_config.timeout;
        let canvas = bounded(timeout, self.store.get_canvas(canvas_id))
            .await?
            .ok_or_else(|| AppError::CanvasNotFound(canvas_id.to_string()))?;

        let (width, height) = (canvas.width, canvas.height);
        if width > self.max_side || height > self.max_side {
            tracing::warn!(canvas_id, width, height, "Canvas too large to assemble");
            return Err(AppError::CanvasTooLarge {
                width,
                height,
                max_side: self.max_side,
            });
        }

        let mut grid = DenseGrid::new(width, height, self.background);
        let mut skipped = 0;
        let mut last_seen: Option<CellCoord> = None;
        let mut restarts = 0;
        let mut pixels = self.store.scan_pixels(canvas_id, width, height, None);

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::warn!(canvas_id, "Snapshot assembly cancelled");
                    return Err(AppError::Cancelled);
                }
                next = tokio::time::timeout(timeout, pixels.next()) => {
                    next.unwrap_or(Some(Err(StoreError::Timeout(timeout))))
                }
            };

            let pixel = match next {
                None => break,
                Some(Ok(pixel)) => pixel,
                Some(Err(e))
                    if e.is_transient() && restarts + 1 < self.store_config.write_attempts =>
                {
                    restarts += 1;
                    tracing::warn!(
                        canvas_id,
                        error = %e,
                        after = ?last_seen,
                        "Pixel scan failed, resuming"
                    );
                    pixels = self.store.scan_pixels(canvas_id, width, height, last_seen);
                    continue;
                }
                Some(Err(e)) => return Err(e.into()),
            };

            let coord = pixel.coord();
            if grid.overlay(pixel) {
                last_seen = Some(coord);
            } else {
                tracing::warn!(
                    canvas_id,
                    %coord,
                    width,
                    height,
                    "Skipping out-of-range pixel record"
                );
                skipped += 1;
            }
        }

        tracing::info!(
            canvas_id,
            width,
            height,
            drawn = grid.drawn_count(),
            skipped,
            "Snapshot assembled"
        );

        Ok(Snapshot {
            canvas,
            grid,
            skipped,
        })
    }
}
