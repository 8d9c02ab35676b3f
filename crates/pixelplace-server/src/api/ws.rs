use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::Response,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::error::AppError;
use crate::feed::PixelEvent;
use crate::AppState;

/// Live pixel feed of one canvas
async fn ws_handler(
    State(state): State<AppState>,
    Path(canvas_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    let events = open_feed(&state, &canvas_id).await?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, canvas_id, events)))
}

/// Subscribe to an existing canvas; unknown ids never get a channel
async fn open_feed(
    state: &AppState,
    canvas_id: &str,
) -> Result<broadcast::Receiver<PixelEvent>, AppError> {
    state.engine.sessions.get(canvas_id).await?;
    Ok(state.feed.subscribe(canvas_id).await)
}

async fn handle_socket(
    socket: WebSocket,
    state: AppState,
    canvas_id: String,
    mut events: broadcast::Receiver<PixelEvent>,
) {
    let (mut sender, mut receiver) = socket.split();
    let shutdown = state.shutdown.clone();

    // Forward committed pixels to this client
    let log_id = canvas_id.clone();
    let mut send_task = tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => break,
                event = events.recv() => event,
            };
            let event = match event {
                Ok(event) => event,
                Err(RecvError::Lagged(missed)) => {
                    tracing::debug!(canvas_id = %log_id, missed, "Feed subscriber lagging");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!("Failed to encode pixel event: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = sender.send(Message::Close(None)).await;
    });

    // The feed is one-way; drain the client until it goes away
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    let sender_done = tokio::select! {
        _ = &mut send_task => true,
        _ = &mut recv_task => false,
    };
    if sender_done {
        recv_task.abort();
    } else {
        // The subscription lives in the send task; wait until it is dropped
        send_task.abort();
        let _ = send_task.await;
    }

    state.feed.release(&canvas_id).await;
    tracing::debug!("WebSocket connection closed for canvas {}", canvas_id);
}

pub fn router() -> Router<AppState> {
    Router::new().route("/ws/{canvas_id}", get(ws_handler))
}
