use axum::{body::Bytes, extract::State, routing::post, Json, Router};
use chrono::Utc;
use pixelplace_core::Color;
use serde::Deserialize;

use super::{decode_payload, require_field};
use crate::engine::{CommittedPixel, DrawRequest};
use crate::error::AppError;
use crate::AppState;

/// Draw command as delivered by the chat front end
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawPayload {
    pub x: i64,
    pub y: i64,
    pub color: String,
    pub author_id: String,
    pub canvas_id: String,
}

impl TryFrom<DrawPayload> for DrawRequest {
    type Error = AppError;

    fn try_from(payload: DrawPayload) -> Result<Self, Self::Error> {
        require_field("canvasId", &payload.canvas_id)?;
        require_field("authorId", &payload.author_id)?;
        let color = payload
            .color
            .parse::<Color>()
            .map_err(|e| AppError::InvalidPayload(format!("color: {e}")))?;

        Ok(DrawRequest {
            canvas_id: payload.canvas_id,
            x: payload.x,
            y: payload.y,
            color,
            writer_id: payload.author_id,
        })
    }
}

/// Draw one pixel
async fn draw_pixel(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<CommittedPixel>, AppError> {
    let payload: DrawPayload = decode_payload(&body)?;
    let request = DrawRequest::try_from(payload)?;
    let committed = state.engine.writer.write(&request, Utc::now()).await?;
    Ok(Json(committed))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/draw", post(draw_pixel))
}
