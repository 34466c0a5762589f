mod core;
mod features;
mod modules;
mod shared;

use crate::core::config::Config;
use crate::core::middleware;
use crate::core::openapi::{ApiDoc, OpenApiInfoModifier};
use crate::features::documents::{routes as documents_routes, DocumentService};
use crate::features::documents::services::UploadGateway;
use crate::modules::storage::{ObjectStore, SqliteObjectStore, TempDirBlobSink, TieredStore};
use axum::{routing::get, Json, Router};
use std::sync::Arc;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::Modify;
use utoipa::OpenApi;

fn main() -> anyhow::Result<()> {
    // Build Tokio runtime with configurable worker threads
    let worker_threads = std::env::var("TOKIO_WORKER_THREADS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4)
        });

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .max_blocking_threads(worker_threads * 4)
        .enable_all()
        .build()?;

    runtime.block_on(async_main(worker_threads))
}

async fn async_main(worker_threads: usize) -> anyhow::Result<()> {
    // Load .env file BEFORE initializing logger so RUST_LOG is available
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!(e))?;

    tracing::info!(
        "System info: tokio_worker_threads={}, pid={}",
        worker_threads,
        std::process::id()
    );
    tracing::info!("Configuration loaded successfully");

    // Stores open lazily on first use; a primary that cannot open hands over to the fallback
    let primary = Arc::new(SqliteObjectStore::new("primary", config.store.clone()));
    let fallback = config.fallback_store.clone().map(|store| {
        tracing::info!("Fallback document store configured: {}", store.url);
        Arc::new(SqliteObjectStore::new("fallback", store)) as Arc<dyn ObjectStore>
    });
    let tiered = Arc::new(TieredStore::new(primary.clone(), fallback));
    tracing::info!("Document store configured: {}", config.store.url);

    // Warm up the primary so schema problems show at startup; failure is not fatal
    if let Err(e) = primary.pool().await {
        tracing::warn!("Primary document store unavailable at startup: {}", e);
    }

    tokio::fs::create_dir_all(&config.download.dir)
        .await
        .map_err(|e| {
            anyhow::anyhow!(
                "Failed to create download directory {}: {}",
                config.download.dir.display(),
                e
            )
        })?;
    let sink = Arc::new(TempDirBlobSink::from_config(&config.download));
    tracing::info!(
        "Downloads materialized under {} (grace period {:?})",
        sink.root().display(),
        config.download.grace_period
    );

    let document_service = Arc::new(DocumentService::new(
        UploadGateway::new(Arc::clone(&tiered)),
        Arc::clone(&tiered),
        sink,
        config.upload.clone(),
    ));
    tracing::info!("Document service initialized");

    let mut openapi = ApiDoc::openapi();
    OpenApiInfoModifier {
        title: config.openapi.title.clone(),
        version: config.openapi.version.clone(),
        description: config.openapi.description.clone(),
    }
    .modify(&mut openapi);
    let openapi_route = Router::new().route(
        "/api-docs/openapi.json",
        get(move || {
            let doc = openapi.clone();
            async move { Json(doc) }
        }),
    );

    // Simple health check endpoint (no auth required)
    async fn health_check() -> axum::http::StatusCode {
        axum::http::StatusCode::OK
    }
    let health_route = Router::new().route("/health", get(health_check));

    let app = Router::new()
        .merge(documents_routes::router(
            document_service,
            config.admin.credentials(),
        ))
        .merge(documents_routes::downloads_router(&config.download))
        .merge(openapi_route)
        .merge(health_route)
        .layer(middleware::cors_layer(
            config.app.cors_allowed_origins.clone(),
        ))
        // Propagate X-Request-Id to response headers
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(middleware::MakeSpanWithRequestId)
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Generate X-Request-Id using UUID v7 (or use client-provided one)
        .layer(SetRequestIdLayer::x_request_id(middleware::MakeRequestUuid));

    // Start server
    let addr = config.app.server_address();
    let socket_addr: std::net::SocketAddr = addr
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid address: {}", e))?;

    // Use socket2 for TCP listener configuration
    let socket = socket2::Socket::new(
        socket2::Domain::for_address(socket_addr),
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nodelay(true)?;

    // Uploads and downloads move whole documents
    socket.set_recv_buffer_size(1024 * 1024)?;
    socket.set_send_buffer_size(1024 * 1024)?;

    let keepalive = socket2::TcpKeepalive::new().with_time(std::time::Duration::from_secs(60));
    socket.set_tcp_keepalive(&keepalive)?;

    socket.set_nonblocking(true)?;
    socket.bind(&socket_addr.into())?;
    socket.listen(1024)?;

    let listener = tokio::net::TcpListener::from_std(socket.into())?;
    tracing::info!("Server listening on {}", format!("http://{}", addr));
    tracing::info!(
        "OpenAPI document available at {}",
        format!("http://{}/api-docs/openapi.json", addr)
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tiered.close().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}
