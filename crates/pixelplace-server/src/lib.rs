pub mod api;
pub mod blob;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod feed;

use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::blob::{LocalObjectStore, ObjectStore, UrlSigner};
use crate::config::{Config, StoreBackend};
use crate::db::{CanvasStore, Database, MemoryStore};
use crate::engine::Engine;
use crate::feed::PixelFeed;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub objects: Arc<dyn ObjectStore>,
    pub signer: UrlSigner,
    pub feed: Arc<PixelFeed>,
    /// Cancelled when the server shuts down; long-running work derives from it
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        config: &Config,
        store: Arc<dyn CanvasStore>,
        objects: Arc<dyn ObjectStore>,
        signer: UrlSigner,
    ) -> Self {
        let feed = Arc::new(PixelFeed::new());
        let engine = Arc::new(Engine::new(config, store, objects.clone(), feed.clone()));

        Self {
            engine,
            objects,
            signer,
            feed,
            shutdown: CancellationToken::new(),
        }
    }
}

/// Build the router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::router())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn CanvasStore>> {
    match &config.backend {
        StoreBackend::Postgres { database_url } => {
            let db = Database::connect(database_url, config.store.page_size).await?;
            db.migrate().await?;
            Ok(Arc::new(db))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; nothing survives a restart");
            Ok(Arc::new(MemoryStore::with_page_size(config.store.page_size)))
        }
    }
}

async fn shutdown_signal(token: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
    token.cancel();
}

/// Run the server with the given configuration
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let store = open_store(&config).await?;

    let signer = UrlSigner::new(
        config.signing_secret.as_bytes(),
        config.public_base_url.as_str(),
    );
    let objects = LocalObjectStore::open(&config.snapshot.dir, signer.clone()).await?;
    tracing::info!(dir = %objects.root().display(), "Snapshot objects stored locally");

    let state = AppState::new(&config, store, Arc::new(objects), signer);
    let shutdown = state.shutdown.clone();
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    Ok(())
}
