// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! HTTP API
//!
//! Routes under `/api/v1/consciousness` (rate limited per client) plus the
//! unlimited `/`, `/health` and `/ready` probes. Handlers validate input,
//! call the application services and shape JSON responses; they hold no
//! orchestration logic of their own.

use crate::application::health_prober::HealthProber;
use crate::application::orchestrator::{AnalysisOrchestrator, OrchestrationError};
use crate::domain::analysis::{
    AnalysisRequest, Depth, Protocol, RequestError, MAX_SIGNAL_CHARS, MIN_SIGNAL_CHARS,
};
use crate::domain::repository::{AnalysisId, AnalysisRepository, StoredAnalysis};
use crate::presentation::rate_limit::{limit_requests, ApiRateLimiter};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{Method, StatusCode, Uri},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

pub const DEFAULT_HISTORY_LIMIT: usize = 20;
pub const MAX_HISTORY_LIMIT: usize = 100;
const HISTORY_SIGNAL_PREVIEW_CHARS: usize = 100;

pub struct AppState {
    pub orchestrator: Arc<AnalysisOrchestrator>,
    pub prober: Arc<HealthProber>,
    pub repository: Arc<dyn AnalysisRepository>,
    pub rate_limiter: Option<Arc<ApiRateLimiter>>,
    pub start_time: Instant,
}

pub fn app(state: AppState) -> Router {
    let consciousness = Router::new()
        .route("/analyze", post(analyze_handler))
        .route("/history", get(history_handler))
        .route("/analysis/{id}", get(get_analysis_handler))
        .route("/oracles/status", get(oracle_status_handler))
        .route("/oracles/health-check", post(health_check_handler))
        .route("/analytics", get(analytics_handler));
    let consciousness = match state.rate_limiter.clone() {
        Some(limiter) => consciousness.layer(middleware::from_fn_with_state(limiter, limit_requests)),
        None => consciousness,
    };

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .nest("/api/v1/consciousness", consciousness)
        .fallback(not_found_handler)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

fn error_response(status: StatusCode, error: &str, message: impl Into<Value>) -> Response {
    (
        status,
        Json(json!({
            "success": false,
            "error": error,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeBody {
    pub signal: String,
    pub protocol: String,
    /// Whole numbers only; `3.0` is accepted
    pub depth: f64,
    #[serde(default)]
    pub save_to_vault: bool,
    #[serde(default)]
    pub context: Option<Value>,
}

/// Collect every validation problem rather than stopping at the first
fn validate_body(body: &AnalyzeBody) -> Result<AnalysisRequest, Vec<String>> {
    let mut problems = Vec::new();

    let chars = body.signal.chars().count();
    if chars < MIN_SIGNAL_CHARS {
        problems.push(RequestError::SignalTooShort.to_string());
    } else if chars > MAX_SIGNAL_CHARS {
        problems.push(RequestError::SignalTooLong.to_string());
    }

    let protocol = match body.protocol.parse::<Protocol>() {
        Ok(protocol) => Some(protocol),
        Err(e) => {
            problems.push(e.to_string());
            None
        }
    };

    let depth = Some(body.depth)
        .filter(|d| d.fract() == 0.0 && (1.0..=5.0).contains(d))
        .and_then(|d| Depth::new(d as u8).ok());
    if depth.is_none() {
        problems.push(format!("Depth must be between 1 and 5, got {}", body.depth));
    }

    match (protocol, depth) {
        (Some(protocol), Some(depth)) if problems.is_empty() => {
            let mut request = AnalysisRequest::validated(body.signal.as_str(), protocol, depth)
                .map_err(|e| vec![e.to_string()])?
                .with_computed_complexity();
            if let Some(context) = &body.context {
                request = request.with_context(context.clone());
            }
            Ok(request)
        }
        _ => Err(problems),
    }
}

async fn analyze_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AnalyzeBody>, JsonRejection>,
) -> Response {
    let body = match payload {
        Ok(Json(body)) => body,
        Err(rejection) => {
            return error_response(StatusCode::BAD_REQUEST, "Invalid input", json!([rejection.body_text()]));
        }
    };

    let request = match validate_body(&body) {
        Ok(request) => request,
        Err(problems) => return error_response(StatusCode::BAD_REQUEST, "Invalid input", json!(problems)),
    };

    info!(
        protocol = %request.protocol(),
        depth = request.depth().get(),
        "Starting consciousness analysis"
    );

    let started = Instant::now();
    let result = match state.orchestrator.analyze(&request).await {
        Ok(result) => result,
        Err(e @ OrchestrationError::NoBackendsConfigured) => {
            return error_response(StatusCode::SERVICE_UNAVAILABLE, "Analysis failed", e.to_string());
        }
        Err(e @ OrchestrationError::AllBackendsFailed { .. }) => {
            return error_response(StatusCode::BAD_GATEWAY, "Analysis failed", e.to_string());
        }
    };
    let total_ms = started.elapsed().as_millis() as u64;

    let mut saved = false;
    if body.save_to_vault {
        let stored = StoredAnalysis {
            id: AnalysisId::new(),
            signal: request.signal().to_string(),
            protocol: request.protocol(),
            depth: request.depth().get(),
            content: result.content().to_string(),
            backend: result.backend().to_string(),
            processing_time_ms: total_ms,
            confidence: result.confidence(),
            created_at: chrono::Utc::now(),
        };
        match state.repository.save_analysis(&stored).await {
            Ok(()) => saved = true,
            Err(e) => warn!(error = %e, "Failed to save analysis"),
        }
    }

    Json(json!({
        "success": true,
        "analysis": {
            "content": result.content(),
            "oracle": result.backend(),
            "confidence": result.confidence(),
            "processingTime": total_ms,
            "protocol": request.protocol(),
            "depth": request.depth().get(),
            "complexity": request.complexity(),
            "saved": saved,
        },
        "metadata": result.metadata(),
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<String>,
}

/// Parse `limit`, falling back to the default for missing, zero or invalid values
fn history_limit(raw: Option<&str>) -> usize {
    raw.and_then(|s| s.trim().parse::<usize>().ok())
        .filter(|limit| *limit > 0)
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(MAX_HISTORY_LIMIT)
}

fn signal_preview(signal: &str) -> String {
    if signal.chars().count() > HISTORY_SIGNAL_PREVIEW_CHARS {
        let head: String = signal.chars().take(HISTORY_SIGNAL_PREVIEW_CHARS).collect();
        format!("{}...", head)
    } else {
        signal.to_string()
    }
}

async fn history_handler(State(state): State<Arc<AppState>>, Query(query): Query<HistoryQuery>) -> Response {
    let limit = history_limit(query.limit.as_deref());

    match state.repository.history(limit).await {
        Ok(history) => {
            let items: Vec<Value> = history
                .iter()
                .map(|item| {
                    json!({
                        "id": item.id.0,
                        "signal": signal_preview(&item.signal),
                        "protocol": item.protocol,
                        "depth": item.depth,
                        "oracle": item.backend,
                        "confidence": item.confidence,
                        "processingTime": item.processing_time_ms,
                        "createdAt": item.created_at,
                    })
                })
                .collect();
            Json(json!({
                "success": true,
                "total": items.len(),
                "history": items,
            }))
            .into_response()
        }
        Err(e) => {
            error!(error = %e, "History retrieval failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to retrieve history", e.to_string())
        }
    }
}

async fn get_analysis_handler(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    let id = match uuid::Uuid::parse_str(&id) {
        Ok(uuid) => AnalysisId(uuid),
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "Invalid analysis id", id),
    };

    match state.repository.find_analysis(id).await {
        Ok(Some(analysis)) => Json(json!({
            "success": true,
            "analysis": {
                "id": analysis.id.0,
                "signal": analysis.signal,
                "protocol": analysis.protocol,
                "depth": analysis.depth,
                "content": analysis.content,
                "oracle": analysis.backend,
                "confidence": analysis.confidence,
                "processingTime": analysis.processing_time_ms,
                "createdAt": analysis.created_at,
            }
        }))
        .into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Analysis not found", id.0.to_string()),
        Err(e) => {
            error!(error = %e, "Analysis retrieval failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to retrieve analysis", e.to_string())
        }
    }
}

async fn oracle_status_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let status = state.orchestrator.status();
    let mut body = serde_json::to_value(&status).unwrap_or_else(|_| json!({}));
    if let Some(object) = body.as_object_mut() {
        object.insert("success".to_string(), json!(true));
    }
    Json(body)
}

async fn health_check_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let results = state.prober.probe_all().await;
    Json(json!({
        "success": true,
        "healthCheck": results,
    }))
}

async fn analytics_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "success": true,
        "analytics": state.orchestrator.analytics(),
    }))
}

async fn root_handler() -> Json<Value> {
    Json(json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "status": "operational",
        "timestamp": chrono::Utc::now(),
        "endpoints": ["/health", "/ready", "/api/v1/consciousness"],
    }))
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Response {
    let uptime = state.start_time.elapsed().as_secs();
    match state.repository.ping().await {
        Ok(()) => Json(json!({
            "status": "healthy",
            "service": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": chrono::Utc::now(),
            "uptime_seconds": uptime,
            "database": "connected",
        }))
        .into_response(),
        Err(e) => {
            warn!(error = %e, "Health check failed to reach the repository");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "service": env!("CARGO_PKG_NAME"),
                    "version": env!("CARGO_PKG_VERSION"),
                    "timestamp": chrono::Utc::now(),
                    "uptime_seconds": uptime,
                    "database": "disconnected",
                    "error": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}

async fn ready_handler(State(state): State<Arc<AppState>>) -> Response {
    if let Err(e) = state.repository.ping().await {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "not ready",
                "timestamp": chrono::Utc::now(),
                "error": e.to_string(),
            })),
        )
            .into_response();
    }

    let status = state.orchestrator.status();
    Json(json!({
        "status": "ready",
        "service": env!("CARGO_PKG_NAME"),
        "timestamp": chrono::Utc::now(),
        "checks": {
            "database": "ok",
            "backends": {
                "total": status.total_backends,
                "available": status.available_backends,
            },
            "uptime_seconds": state.start_time.elapsed().as_secs(),
        },
    }))
    .into_response()
}

async fn not_found_handler(method: Method, uri: Uri) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Endpoint not found",
            "path": uri.path(),
            "method": method.as_str(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_limit() {
        assert_eq!(history_limit(None), 20);
        assert_eq!(history_limit(Some("5")), 5);
        assert_eq!(history_limit(Some("0")), 20);
        assert_eq!(history_limit(Some("abc")), 20);
        assert_eq!(history_limit(Some("-3")), 20);
        assert_eq!(history_limit(Some("500")), 100);
    }

    #[test]
    fn test_signal_preview() {
        let short = "short signal";
        assert_eq!(signal_preview(short), short);

        let long = "ä".repeat(150);
        let preview = signal_preview(&long);
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), 103);
    }

    #[test]
    fn test_validate_body_collects_problems() {
        let body = AnalyzeBody {
            signal: "too short".to_string(),
            protocol: "astral".to_string(),
            depth: 9.0,
            save_to_vault: false,
            context: None,
        };
        let problems = validate_body(&body).unwrap_err();
        assert_eq!(problems.len(), 3);
    }

    #[test]
    fn test_validate_body_accepts_mixed_case_protocol() {
        let body = AnalyzeBody {
            signal: "I keep dreaming of an endless staircase.".to_string(),
            protocol: "Spiral".to_string(),
            depth: 3.0,
            save_to_vault: true,
            context: Some(json!({"analysis_count": 2})),
        };
        let request = validate_body(&body).unwrap();
        assert_eq!(request.protocol(), Protocol::Spiral);
        assert!(request.complexity().is_some());
        assert!(request.context().is_some());
    }

    #[test]
    fn test_validate_body_depth_must_be_whole() {
        let mut body = AnalyzeBody {
            signal: "Floating lanterns above a frozen lake.".to_string(),
            protocol: "linear".to_string(),
            depth: 3.0,
            save_to_vault: false,
            context: None,
        };
        assert_eq!(validate_body(&body).unwrap().depth().get(), 3);

        body.depth = 2.5;
        assert!(validate_body(&body).is_err());
        body.depth = 0.0;
        assert!(validate_body(&body).is_err());
    }
}
