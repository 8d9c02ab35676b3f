use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use pixelplace_core::{CanvasStatus, RasterError};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

use crate::blob::{ObjectStoreError, SignatureError};
use crate::db::StoreError;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Canvas {0} not found")]
    CanvasNotFound(String),

    #[error("Canvas {canvas_id} is not accepting draws (status {status})")]
    CanvasInactive {
        canvas_id: String,
        status: CanvasStatus,
    },

    #[error("Cooldown active, retry in {}s", retry_after_secs(.retry_after))]
    RateLimited { retry_after: Duration },

    #[error("Pixel ({x}, {y}) is outside the {width}x{height} canvas")]
    OutOfBounds {
        x: i64,
        y: i64,
        width: u32,
        height: u32,
    },

    #[error("Canvas is {width}x{height}, larger than the {max_side}px side limit")]
    CanvasTooLarge {
        width: u32,
        height: u32,
        max_side: u32,
    },

    #[error("Snapshot rendering failed: {0}")]
    Raster(#[from] RasterError),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] StoreError),

    #[error("Object storage unavailable: {0}")]
    ObjectStorage(#[from] ObjectStoreError),

    #[error("Snapshot upload failed: {0}")]
    Publish(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(#[from] SignatureError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn retry_after_secs(retry_after: &Duration) -> u64 {
    // Round up so clients never retry a moment too early
    retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0)
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::CanvasNotFound(_) | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::CanvasInactive { .. } => StatusCode::CONFLICT,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::OutOfBounds { .. } | AppError::CanvasTooLarge { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::InvalidPayload(_) | AppError::Serialization(_) => StatusCode::BAD_REQUEST,
            AppError::StorageUnavailable(_) | AppError::ObjectStorage(_) | AppError::Publish(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Raster(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::StorageUnavailable(e) => {
                tracing::error!("Storage error: {:?}", e);
                "Storage unavailable".to_string()
            }
            AppError::ObjectStorage(e) => {
                tracing::error!("Object storage error: {:?}", e);
                "Object storage unavailable".to_string()
            }
            AppError::Raster(e) => {
                tracing::error!("Rasterization error: {:?}", e);
                "Snapshot rendering failed".to_string()
            }
            AppError::Publish(msg) => {
                tracing::error!("Publish error: {}", msg);
                self.to_string()
            }
            AppError::Serialization(e) => {
                tracing::warn!("Serialization error: {:?}", e);
                "Invalid JSON".to_string()
            }
            _ => self.to_string(),
        };

        let mut response = (status, Json(json!({ "error": message }))).into_response();
        if let AppError::RateLimited { retry_after } = &self {
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from(retry_after_secs(retry_after)),
            );
        }
        response
    }
}
