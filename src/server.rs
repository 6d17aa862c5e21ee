use std::sync::Arc;

use anyhow::Result;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::time::Instant;
use tower_http::trace::TraceLayer;

use crate::session::Route;

/// Stand-in for the study-coach backend's health surface.
#[derive(Clone)]
pub struct HealthState {
    inner: Arc<HealthInner>,
}

struct HealthInner {
    service: String,
    started: Instant,
}

impl HealthState {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(HealthInner {
                service: service.into(),
                started: Instant::now(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthBody {
    pub status: &'static str,
    pub service: String,
    pub uptime_secs: u64,
}

pub fn router(state: HealthState) -> Router {
    Router::new()
        .route("/", get(get_root))
        .route(Route::Health.path(), get(get_health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serve the health router on an already bound listener until the task is dropped.
pub async fn serve(listener: TcpListener, state: HealthState) -> Result<()> {
    tracing::info!(addr = %listener.local_addr()?, "health server listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

pub async fn spawn_server(bind: &str, service: &str) -> Result<()> {
    let listener = TcpListener::bind(bind).await?;
    serve(listener, HealthState::new(service)).await
}

async fn get_health(State(app): State<HealthState>) -> impl IntoResponse {
    let body = HealthBody {
        status: "healthy",
        service: app.inner.service.clone(),
        uptime_secs: app.inner.started.elapsed().as_secs(),
    };
    (StatusCode::OK, Json(body))
}

async fn get_root(State(app): State<HealthState>) -> impl IntoResponse {
    let msg = format!("{} is running", app.inner.service);
    (StatusCode::OK, Json(serde_json::json!({ "message": msg, "status": "healthy" })))
}
