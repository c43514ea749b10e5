//! HTTP API Server
//!
//! Axum routes for submitting clones, inspecting jobs, streaming job events
//! over SSE and serving finished clones as static files.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::Path as FsPath;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::{Method, StatusCode},
    response::{
        sse::{Event as SseEvent, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_stream::StreamExt as _;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cloner::WebsiteCloner;
use crate::config::ClonerConfig;
use crate::jobs::{JobManager, JobStatus};

#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<JobManager>,
}

#[derive(Debug, Deserialize)]
pub struct CloneRequest {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloneStarted {
    pub job_id: Uuid,
    pub status: JobStatus,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

fn job_not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "Job not found")
}

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": Utc::now(),
    }))
}

/// Start a clone job
pub async fn start_clone(
    State(state): State<AppState>,
    Json(request): Json<CloneRequest>,
) -> Response {
    let url = match request.url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => url.to_string(),
        _ => return error_response(StatusCode::BAD_REQUEST, "URL is required"),
    };

    match state.jobs.submit(&url) {
        Ok(job_id) => Json(CloneStarted {
            job_id,
            status: JobStatus::Running,
        })
        .into_response(),
        Err(e) => {
            debug!("Rejected clone request for {:?}: {}", url, e);
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
    }
}

pub async fn list_jobs(State(state): State<AppState>) -> Response {
    Json(state.jobs.list()).into_response()
}

pub async fn get_job(State(state): State<AppState>, Path(job_id): Path<String>) -> Response {
    let Ok(job_id) = Uuid::parse_str(&job_id) else {
        return job_not_found();
    };
    match state.jobs.get(&job_id) {
        Some(job) => Json(job).into_response(),
        None => job_not_found(),
    }
}

/// Stream a job's events: the buffered history, then live events until the
/// job finishes.
pub async fn job_events(State(state): State<AppState>, Path(job_id): Path<String>) -> Response {
    let Some(subscription) = Uuid::parse_str(&job_id)
        .ok()
        .and_then(|id| state.jobs.subscribe(&id))
    else {
        warn!("SSE subscribe failed: job {} not found", job_id);
        return job_not_found();
    };
    info!("SSE client connected for job {}", job_id);

    let stream = subscription
        .into_stream()
        .filter_map(move |event| match serde_json::to_string(&event) {
            Ok(json) => Some(Ok::<_, Infallible>(
                SseEvent::default().event(event.kind.as_str()).data(json),
            )),
            Err(e) => {
                warn!("SSE serialization error for job {}: {}", job_id, e);
                None
            }
        });

    Sse::new(stream)
        .keep_alive(KeepAlive::default().interval(Duration::from_secs(15)))
        .into_response()
}

pub fn create_router(state: AppState, output_dir: &FsPath) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        .route("/clone", post(start_clone))
        .route("/jobs", get(list_jobs))
        .route("/jobs/:job_id", get(get_job))
        .route("/jobs/:job_id/events", get(job_events))
        .with_state(state);

    Router::new()
        .nest("/api", api)
        .nest_service("/clone", ServeDir::new(output_dir))
}

/// Run the HTTP API until Ctrl-C.
pub async fn run(config: ClonerConfig) -> Result<()> {
    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .context("Invalid HTTP listen address")?;

    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .with_context(|| format!("Failed to create output directory {:?}", config.output_dir))?;

    let cloner = WebsiteCloner::with_http(&config).context("Failed to build HTTP client")?;
    let state = AppState {
        jobs: Arc::new(JobManager::new(Arc::new(cloner))),
    };

    let mut app = create_router(state, &config.output_dir);

    if config.cors_enabled {
        let cors = CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
            .allow_origin(Any);
        app = app.layer(cors);
    }

    app = app.layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(&addr)
        .await
        .context("Failed to bind HTTP server")?;

    info!("Website cloner listening on http://{}", addr);
    info!("Clones are written to {:?}", config.output_dir);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("HTTP server shutting down");
        })
        .await
        .context("HTTP server error")?;

    Ok(())
}
