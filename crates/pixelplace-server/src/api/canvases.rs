use axum::{
    body::Bytes,
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use pixelplace_core::Canvas;
use serde::Serialize;

use super::decode_payload;
use crate::engine::StartCanvas;
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResetResponse {
    canvas_id: String,
    removed: u64,
}

/// Start a drawing session
async fn start_canvas(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Canvas>, AppError> {
    let request: StartCanvas = decode_payload(&body)?;
    let canvas = state.engine.sessions.start(request).await?;
    Ok(Json(canvas))
}

async fn get_canvas(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Canvas>, AppError> {
    Ok(Json(state.engine.sessions.get(&id).await?))
}

async fn pause_canvas(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Canvas>, AppError> {
    Ok(Json(state.engine.sessions.pause(&id).await?))
}

async fn resume_canvas(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Canvas>, AppError> {
    Ok(Json(state.engine.sessions.resume(&id).await?))
}

async fn end_canvas(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Canvas>, AppError> {
    Ok(Json(state.engine.sessions.end(&id).await?))
}

/// Wipe every pixel of the canvas
async fn reset_canvas(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ResetResponse>, AppError> {
    let removed = state.engine.sessions.reset(&id).await?;
    Ok(Json(ResetResponse {
        canvas_id: id,
        removed,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/canvases", post(start_canvas))
        .route("/api/canvases/{id}", get(get_canvas))
        .route("/api/canvases/{id}/pause", post(pause_canvas))
        .route("/api/canvases/{id}/resume", post(resume_canvas))
        .route("/api/canvases/{id}/end", post(end_canvas))
        .route("/api/canvases/{id}/reset", post(reset_canvas))
}
