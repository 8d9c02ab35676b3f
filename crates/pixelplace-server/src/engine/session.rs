use chrono::{DateTime, Utc};
use pixelplace_core::{Canvas, CanvasStatus};
use serde::Deserialize;
use std::sync::Arc;

use super::{bounded, retry_idempotent};
use crate::config::StoreConfig;
use crate::db::CanvasStore;
use crate::error::AppError;

/// Parameters of a new drawing session
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartCanvas {
    pub canvas_id: String,
    pub admin_id: String,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub start_date: DateTime<Utc>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
}

/// Canvas ids end up in object names, so keep them to a safe charset
pub fn validate_canvas_id(canvas_id: &str) -> Result<(), AppError> {
    let ok = !canvas_id.is_empty()
        && canvas_id.len() <= 128
        && canvas_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(())
    } else {
        Err(AppError::InvalidPayload(format!(
            "canvasId must be 1-128 characters of [A-Za-z0-9_-], got {canvas_id:?}"
        )))
    }
}

/// Lifecycle of drawing sessions: start, pause, resume, end and reset
pub struct SessionManager {
    store: Arc<dyn CanvasStore>,
    max_side: u32,
    store_config: StoreConfig,
}

impl SessionManager {
    pub fn new(store: Arc<dyn CanvasStore>, max_side: u32, store_config: StoreConfig) -> Self {
        Self {
            store,
            max_side,
            store_config,
        }
    }

    /// Create a canvas in the `START` state, replacing any canvas with that id
    pub async fn start(&self, request: StartCanvas) -> Result<Canvas, AppError> {
        validate_canvas_id(&request.canvas_id)?;
        if request.admin_id.trim().is_empty() {
            return Err(AppError::InvalidPayload("adminId must not be empty".into()));
        }
        if request.name.trim().is_empty() {
            return Err(AppError::InvalidPayload("name must not be empty".into()));
        }
        if request.width == 0 || request.height == 0 {
            return Err(AppError::InvalidPayload(format!(
                "canvas size must be positive, got {}x{}",
                request.width, request.height
            )));
        }
        if request.width > self.max_side || request.height > self.max_side {
            return Err(AppError::InvalidPayload(format!(
                "canvas size {}x{} exceeds the {}px side limit",
                request.width, request.height, self.max_side
            )));
        }

        let start_date = request.start_date;
        if request.end_date.is_some_and(|end| end < start_date) {
            return Err(AppError::InvalidPayload("endDate is before startDate".into()));
        }

        let mut canvas = Canvas::new(
            request.canvas_id,
            request.admin_id,
            request.name,
            request.width,
            request.height,
            start_date,
        );
        canvas.end_date = request.end_date;

        retry_idempotent(&self.store_config, "put_canvas", || {
            self.store.put_canvas(&canvas)
        })
        .await?;

        tracing::info!(
            canvas_id = %canvas.id,
            admin_id = %canvas.admin_id,
            width = canvas.width,
            height = canvas.height,
            "Canvas session started"
        );
        Ok(canvas)
    }

    pub async fn get(&self, canvas_id: &str) -> Result<Canvas, AppError> {
        bounded(self.store_config.timeout, self.store.get_canvas(canvas_id))
            .await?
            .ok_or_else(|| AppError::CanvasNotFound(canvas_id.to_string()))
    }

    pub async fn pause(&self, canvas_id: &str) -> Result<Canvas, AppError> {
        self.set_status(canvas_id, CanvasStatus::Pause).await
    }

    pub async fn resume(&self, canvas_id: &str) -> Result<Canvas, AppError> {
        self.set_status(canvas_id, CanvasStatus::Start).await
    }

    pub async fn end(&self, canvas_id: &str) -> Result<Canvas, AppError> {
        self.set_status(canvas_id, CanvasStatus::End).await
    }

    async fn set_status(&self, canvas_id: &str, status: CanvasStatus) -> Result<Canvas, AppError> {
        let found = retry_idempotent(&self.store_config, "set_canvas_status", || {
            self.store.set_canvas_status(canvas_id, status)
        })
        .await?;
        if !found {
            return Err(AppError::CanvasNotFound(canvas_id.to_string()));
        }

        tracing::info!(canvas_id, %status, "Canvas status changed");
        self.get(canvas_id).await
    }

    /// Remove every pixel of the canvas; its status is left as is
    pub async fn reset(&self, canvas_id: &str) -> Result<u64, AppError> {
        self.get(canvas_id).await?;

        let removed = retry_idempotent(&self.store_config, "delete_pixels", || {
            self.store.delete_pixels(canvas_id)
        })
        .await?;

        tracing::info!(canvas_id, removed, "Canvas reset");
        Ok(removed)
    }
}
