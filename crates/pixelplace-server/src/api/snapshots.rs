use axum::{body::Bytes, extract::State, routing::post, Json, Router};
use serde::Deserialize;

use super::{decode_payload, require_field};
use crate::engine::SnapshotReport;
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotPayload {
    canvas_id: String,
    author_id: String,
}

/// Render the canvas and publish the image and pixel dump
async fn take_snapshot(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SnapshotReport>, AppError> {
    let payload: SnapshotPayload = decode_payload(&body)?;
    require_field("canvasId", &payload.canvas_id)?;
    require_field("authorId", &payload.author_id)?;

    tracing::info!(
        canvas_id = %payload.canvas_id,
        author_id = %payload.author_id,
        "Snapshot requested"
    );

    let cancel = state.shutdown.child_token();
    let report = state.engine.snapshot(&payload.canvas_id, &cancel).await?;
    Ok(Json(report))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/snapshots", post(take_snapshot))
}
