//! HTTP surface.
//!
//! | Route | Response |
//! |-------|----------|
//! | `GET /` | `{"message": "API is running!"}` |
//! | `GET /<route>Scrapped` | that source's articles, or `{"error": ...}` |
//! | `GET /runAllEndpoints` | every source's articles, flattened in registration order, or `{"status": "Failed", "error": ...}` |
//!
//! Every response is `200` with a JSON body except unknown paths, which get
//! `404` with `{"error": ...}`. Pipeline runs are spawned onto their own
//! task so a panic inside one surfaces as a JSON error, not a dropped
//! connection.

use crate::config::SourceRegistry;
use crate::error::PipelineError;
use crate::observe::PipelineObserver;
use crate::scrapers::aggregate;
use crate::scrapers::pipeline::{Limits, SourcePipeline};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument};

const ENDPOINT_SUFFIX: &str = "Scrapped";

/// Shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SourceRegistry>,
    pub limits: Limits,
    pub observer: Arc<dyn PipelineObserver>,
}

impl AppState {
    pub fn new(registry: SourceRegistry, limits: Limits, observer: Arc<dyn PipelineObserver>) -> Self {
        Self {
            registry: Arc::new(registry),
            limits,
            observer,
        }
    }
}

/// Build the router the binary serves.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/runAllEndpoints", get(run_all_endpoints))
        .route("/{endpoint}", get(run_source))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": "API is running!" }))
}

#[instrument(level = "info", skip_all, fields(%endpoint))]
async fn run_source(State(state): State<AppState>, Path(endpoint): Path<String>) -> Response {
    let source = endpoint
        .strip_suffix(ENDPOINT_SUFFIX)
        .and_then(|route| state.registry.get(route))
        .cloned();
    let Some(source) = source else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("Unknown endpoint /{endpoint}") })),
        )
            .into_response();
    };

    let failure_message = source.discovery_failure_message();
    let pipeline = SourcePipeline::new(source, state.observer.clone(), state.limits.clone());
    match tokio::spawn(async move { pipeline.run().await }).await {
        Ok(Ok(report)) => {
            info!(articles = report.articles.len(), "Source endpoint served");
            Json(report.articles).into_response()
        }
        Ok(Err(PipelineError::Discovery(e))) => {
            error!(error = %e, "Discovery failed");
            Json(json!({ "error": failure_message })).into_response()
        }
        Ok(Err(e)) => {
            error!(error = %e, "Pipeline failed");
            Json(json!({ "error": e.to_string() })).into_response()
        }
        Err(e) => {
            error!(error = %e, "Pipeline task aborted");
            Json(json!({ "error": e.to_string() })).into_response()
        }
    }
}

#[instrument(level = "info", skip_all)]
async fn run_all_endpoints(State(state): State<AppState>) -> Response {
    match aggregate::run_all(&state.registry, state.observer.clone(), &state.limits).await {
        Ok(articles) => Json(articles).into_response(),
        Err(e) => Json(json!({ "status": "Failed", "error": e.to_string() })).into_response(),
    }
}
