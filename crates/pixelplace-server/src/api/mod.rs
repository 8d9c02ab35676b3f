mod canvases;
mod draw;
mod health;
mod objects;
mod snapshots;
mod ws;

use axum::Router;
use serde::de::DeserializeOwned;

use crate::error::AppError;
use crate::AppState;

/// Create the API router
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(draw::router())
        .merge(snapshots::router())
        .merge(canvases::router())
        .merge(objects::router())
        .merge(ws::router())
}

/// Decode a JSON body, reporting any problem as an invalid payload
pub(crate) fn decode_payload<T: DeserializeOwned>(body: &[u8]) -> Result<T, AppError> {
    serde_json::from_slice(body).map_err(|e| AppError::InvalidPayload(e.to_string()))
}

/// Reject blank identity fields
pub(crate) fn require_field(name: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        Err(AppError::InvalidPayload(format!("{name} must not be empty")))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::blob::{MemoryObjectStore, UrlSigner};
    use crate::config::Config;
    use crate::db::MemoryStore;
    use crate::{build_router, AppState};

    fn app() -> axum::Router {
        let config = Config::in_memory();
        let signer = UrlSigner::new("secret", "http://localhost:3000");
        let state = AppState::new(
            &config,
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryObjectStore::new(signer.clone())),
            signer,
        );
        build_router(state)
    }

    async fn call(
        app: &axum::Router,
        method: Method,
        uri: &str,
        body: Value,
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn start(app: &axum::Router) {
        let (status, canvas) = call(
            app,
            Method::POST,
            "/api/canvases",
            canvas_body("c1", 2, 2),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(canvas["status"], "START");
    }

    fn canvas_body(canvas_id: &str, width: u32, height: u32) -> Value {
        json!({
            "canvasId": canvas_id,
            "adminId": "admin",
            "name": "Test",
            "width": width,
            "height": height,
            "startDate": "2024-04-01T00:00:00Z",
        })
    }

    fn draw(x: i64, y: i64, author: &str) -> Value {
        json!({"x": x, "y": y, "color": "#ff0000", "authorId": author, "canvasId": "c1"})
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = call(&app(), Method::GET, "/health", Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_draw_flow_and_errors() {
        let app = app();
        start(&app).await;

        let (status, pixel) = call(&app, Method::POST, "/api/draw", draw(0, 0, "alice")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(pixel["color"], "#FF0000");

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/draw")
            .body(Body::from(draw(1, 0, "alice").to_string()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key(header::RETRY_AFTER));

        let (status, _) = call(&app, Method::POST, "/api/draw", draw(5, 5, "bob")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, body) = call(&app, Method::POST, "/api/draw", json!({"x": 0})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid payload"));

        let mut missing = draw(0, 0, "bob");
        missing["canvasId"] = json!("nope");
        let (status, _) = call(&app, Method::POST, "/api/draw", missing).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(&app, Method::POST, "/api/canvases/c1/pause", Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&app, Method::POST, "/api/draw", draw(0, 1, "admin")).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_snapshot_and_signed_download() {
        let app = app();
        start(&app).await;
        call(&app, Method::POST, "/api/draw", draw(0, 0, "alice")).await;

        let (status, report) = call(
            &app,
            Method::POST,
            "/api/snapshots",
            json!({"canvasId": "c1", "authorId": "alice"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["drawn"], 1);

        let image_url = report["imageUrl"].as_str().unwrap();
        let path = image_url.strip_prefix("http://localhost:3000").unwrap();
        let response = app
            .clone()
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let image = image::load_from_memory(&bytes).unwrap();
        assert_eq!((image.width(), image.height()), (1024, 1024));

        // Tampered signature
        let tampered = format!("{}0", path.trim_end_matches(char::is_alphanumeric));
        let response = app
            .clone()
            .oneshot(Request::builder().uri(tampered).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/snapshots",
            json!({"canvasId": "nope", "authorId": "alice"}),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_canvas_lifecycle() {
        let app = app();
        start(&app).await;
        call(&app, Method::POST, "/api/draw", draw(1, 1, "alice")).await;

        let (status, body) = call(&app, Method::POST, "/api/canvases/c1/reset", Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["removed"], 1);

        let (_, canvas) = call(&app, Method::POST, "/api/canvases/c1/end", Value::Null).await;
        assert_eq!(canvas["status"], "END");
        let (_, canvas) = call(&app, Method::POST, "/api/canvases/c1/resume", Value::Null).await;
        assert_eq!(canvas["status"], "START");

        let (status, canvas) = call(&app, Method::GET, "/api/canvases/c1", Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(canvas["width"], 2);

        let (status, _) = call(&app, Method::GET, "/api/canvases/nope", Value::Null).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        for bad in [canvas_body("c2", 0, 2), canvas_body("c2", 100_000, 100_000)] {
            let (status, _) = call(&app, Method::POST, "/api/canvases", bad).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }

        let mut undated = canvas_body("c2", 2, 2);
        undated.as_object_mut().unwrap().remove("startDate");
        let (status, body) = call(&app, Method::POST, "/api/canvases", undated).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("startDate"));

        let (status, _) = call(&app, Method::GET, "/api/canvases/c2", Value::Null).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
