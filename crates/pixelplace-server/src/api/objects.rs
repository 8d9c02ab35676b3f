use axum::{
    extract::{Path, Query, State},
    http::{header, Method},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use chrono::Utc;
use serde::Deserialize;

use crate::blob::{validate_path, SignatureError};
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
struct SignedQuery {
    expires: Option<i64>,
    signature: Option<String>,
}

/// Serve a published object to holders of a valid signed URL
async fn get_object(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(query): Query<SignedQuery>,
) -> Result<Response, AppError> {
    let (Some(expires), Some(signature)) = (query.expires, query.signature) else {
        return Err(SignatureError::Malformed.into());
    };

    validate_path(&path).map_err(|_| AppError::NotFound(format!("Object {path} not found")))?;
    let object = state
        .objects
        .get_object(&path)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Object {path} not found")))?;

    state.signer.verify(
        &Method::GET,
        &path,
        expires,
        &object.content_type,
        &signature,
        Utc::now(),
    )?;

    Ok(([(header::CONTENT_TYPE, object.content_type)], object.bytes).into_response())
}

pub fn router() -> Router<AppState> {
    Router::new().route("/objects/{*path}", get(get_object))
}
