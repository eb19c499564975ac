//! Read API over the sink's tables plus liveness and readiness endpoints.

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::domain::models::{CatalogView, JsonRow, Readiness, ServerConfig};
use crate::domain::ports::{CatalogRepository, ReadinessCheck};

/// Shared state of the read API.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn CatalogRepository>,
    pub readiness: Arc<dyn ReadinessCheck>,
}

#[derive(Debug, Serialize)]
struct ListResponse {
    ok: bool,
    data: Vec<JsonRow>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/ready", get(ready))
        .route("/v1/items", get(items))
        .route("/v1/collections", get(collections))
        .route("/v1/catalog", get(catalog))
        .with_state(Arc::new(state))
        .layer(TraceLayer::new_for_http())
}

async fn ping() -> &'static str {
    "/ping"
}

async fn ready(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Readiness>) {
    let readiness = state.readiness.check().await;
    let status = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(readiness))
}

async fn items(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    list(&state, CatalogView::Items).await
}

async fn collections(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    list(&state, CatalogView::Collections).await
}

async fn catalog(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    list(&state, CatalogView::Catalog).await
}

async fn list(state: &AppState, view: CatalogView) -> (StatusCode, Json<Value>) {
    let rows = match state.catalog.fetch(view).await {
        Ok(rows) => rows,
        Err(e) => {
            error!(view = view.as_str(), error = %e, "read query failed");
            return bad_request();
        }
    };

    match serde_json::to_value(ListResponse { ok: true, data: rows }) {
        Ok(body) => (StatusCode::OK, Json(body)),
        Err(e) => {
            error!(view = view.as_str(), error = %e, "failed to serialize rows");
            bad_request()
        }
    }
}

fn bad_request() -> (StatusCode, Json<Value>) {
    (StatusCode::BAD_REQUEST, Json(json!({ "ok": false, "data": {} })))
}

/// Read API server.
pub struct HttpServer {
    config: ServerConfig,
    state: AppState,
}

impl HttpServer {
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Serve until `shutdown` resolves.
    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port).parse()?;
        let router = build_router(self.state);

        info!("HTTP server listening on {}", addr);

        let listener = TcpListener::bind(addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}
