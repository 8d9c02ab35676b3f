use chrono::{DateTime, Utc};
use pixelplace_core::{in_bounds, CellCoord, Color, CooldownDecision, Pixel, DRAWING};
use serde::Serialize;
use std::sync::Arc;

use super::{bounded, retry_idempotent, RateLimiter};
use crate::config::StoreConfig;
use crate::db::CanvasStore;
use crate::error::AppError;
use crate::feed::{PixelEvent, PixelFeed};

/// A validated draw command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawRequest {
    pub canvas_id: String,
    pub x: i64,
    pub y: i64,
    pub color: Color,
    pub writer_id: String,
}

/// What a successful draw committed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommittedPixel {
    pub canvas_id: String,
    pub x: i64,
    pub y: i64,
    pub color: Color,
    pub updated_at: DateTime<Utc>,
}

/// The single-pixel write path
pub struct PixelWriter {
    store: Arc<dyn CanvasStore>,
    limiter: RateLimiter,
    feed: Arc<PixelFeed>,
    store_config: StoreConfig,
}

impl PixelWriter {
    pub fn new(
        store: Arc<dyn CanvasStore>,
        limiter: RateLimiter,
        feed: Arc<PixelFeed>,
        store_config: StoreConfig,
    ) -> Self {
        Self {
            store,
            limiter,
            feed,
            store_config,
        }
    }

    /// Validate and commit one pixel.
    ///
    /// Checks run in order: canvas status, admin bypass, cooldown, bounds.
    /// Any rejection leaves both the pixel and the cooldown record untouched.
    pub async fn write(
        &self,
        request: &DrawRequest,
        now: DateTime<Utc>,
    ) -> Result<CommittedPixel, AppError> {
        let DrawRequest {
            canvas_id,
            x,
            y,
            color,
            writer_id,
        } = request;

        let canvas = bounded(self.store_config.timeout, self.store.get_canvas(canvas_id))
            .await?
            .ok_or_else(|| AppError::CanvasNotFound(canvas_id.clone()))?;

        if !canvas.status.is_active() {
            tracing::info!(
                canvas_id = %canvas_id,
                status = %canvas.status,
                "Draw rejected, canvas inactive"
            );
            return Err(AppError::CanvasInactive {
                canvas_id: canvas_id.clone(),
                status: canvas.status,
            });
        }

        let is_admin = canvas.is_admin(writer_id);
        if !is_admin {
            if let CooldownDecision::Wait { retry_after } =
                self.limiter.allow(writer_id, DRAWING, now).await?
            {
                tracing::info!(
                    canvas_id = %canvas_id,
                    writer_id = %writer_id,
                    ?retry_after,
                    "Draw rejected, cooldown active"
                );
                return Err(AppError::RateLimited { retry_after });
            }
        }

        if !in_bounds(*x, *y, canvas.width, canvas.height) {
            tracing::info!(canvas_id = %canvas_id, x, y, "Draw rejected, out of bounds");
            return Err(AppError::OutOfBounds {
                x: *x,
                y: *y,
                width: canvas.width,
                height: canvas.height,
            });
        }

        let pixel = Pixel::drawn(CellCoord::new(*x, *y), *color, writer_id.as_str(), now);
        retry_idempotent(&self.store_config, "put_pixel", || {
            self.store.put_pixel(canvas_id, &pixel)
        })
        .await?;

        if !is_admin {
            // The pixel is already committed; a stale cooldown only loosens the next check
            if let Err(e) = self.limiter.commit(writer_id, DRAWING, now).await {
                tracing::warn!(
                    writer_id = %writer_id,
                    error = %e,
                    "Failed to record draw cooldown"
                );
            }
        }

        self.feed
            .publish(
                canvas_id,
                PixelEvent {
                    x: *x,
                    y: *y,
                    color: pixel.color.clone(),
                },
            )
            .await;

        tracing::info!(
            canvas_id = %canvas_id,
            x,
            y,
            color = %color,
            writer_id = %writer_id,
            "Pixel drawn"
        );

        Ok(CommittedPixel {
            canvas_id: canvas_id.clone(),
            x: *x,
            y: *y,
            color: *color,
            updated_at: now,
        })
    }
}
