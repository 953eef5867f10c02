//! The web surface: one page, the volume endpoints, and the analyze action.

pub mod page;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::pipeline::ReportPipeline;
use crate::volume::{Volume, VolumeState};

/// Everything the handlers need, fixed after startup. The volume is
/// immutable for the process lifetime; per-click state lives in the page.
pub struct AppState {
    volume_state: VolumeState,
    voxel_bytes: Vec<u8>,
    pipeline: ReportPipeline,
}

impl AppState {
    pub fn new(volume: Volume, pipeline: ReportPipeline) -> Self {
        Self {
            volume_state: volume.state(),
            voxel_bytes: volume.voxel_bytes(),
            pipeline,
        }
    }
}

#[derive(Serialize)]
struct AnalyzeResponse {
    ok: bool,
    report: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(serve_page))
        .route("/api/volume", get(volume_meta))
        .route("/api/volume/data", get(volume_data))
        .route("/api/analyze", post(analyze))
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
}

/// Bind and serve until ctrl-c.
pub async fn run_server(state: Arc<AppState>, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "Scanlens listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await
}

async fn serve_page(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(page::render(&state.volume_state))
}

async fn volume_meta(State(state): State<Arc<AppState>>) -> Json<VolumeState> {
    Json(state.volume_state.clone())
}

async fn volume_data(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/octet-stream")],
        state.voxel_bytes.clone(),
    )
}

/// Runs the report pipeline off the async runtime. A second click while a
/// request is pending simply starts another run; results land in whatever
/// order the browser receives them.
async fn analyze(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let pipeline = state.pipeline.clone();
    match tokio::task::spawn_blocking(move || pipeline.run()).await {
        Ok(Ok(report)) => (StatusCode::OK, Json(AnalyzeResponse { ok: true, report })),
        Ok(Err(e)) => (
            StatusCode::OK,
            Json(AnalyzeResponse {
                ok: false,
                report: e.to_string(),
            }),
        ),
        Err(e) => {
            tracing::error!("Analysis task failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(AnalyzeResponse {
                    ok: false,
                    report: "Analysis task failed".into(),
                }),
            )
        }
    }
}
