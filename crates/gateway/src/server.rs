//! Axum-based HTTP server for Browzee.

use axum::{
    extract::{Json, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use browzee_core::{config::ServerConfig, types::TaskRequest, Error, Result};

use crate::task_service::{
    ControlResponse, SearchResponse, StatusResponse, TaskResponse, TaskService,
};
use crate::ws::ws_status_handler;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TaskService>,
}

/// Gateway server.
pub struct GatewayServer {
    config: ServerConfig,
    state: AppState,
    metrics_handle: Option<PrometheusHandle>,
}

impl GatewayServer {
    pub fn new(config: ServerConfig, service: Arc<TaskService>) -> Self {
        Self {
            config,
            state: AppState { service },
            metrics_handle: None,
        }
    }

    /// Expose `/metrics` from this recorder.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }

    fn cors_layer(&self) -> CorsLayer {
        let origins = &self.config.allowed_origins;
        let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
        if origins.is_empty() || origins.iter().any(|o| o == "*") {
            return layer.allow_origin(Any);
        }
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        layer.allow_origin(AllowOrigin::list(parsed))
    }

    /// Build the Axum router.
    pub fn build_router(&self) -> Router {
        let mut router = Router::new()
            .route("/health", get(health_handler))
            .route("/status", get(status_handler))
            .route("/run-task", post(run_task_handler))
            .route("/stop-task", post(stop_task_handler))
            .route("/pause-task", post(pause_task_handler))
            .route("/resume-task", post(resume_task_handler))
            .route("/search-proxy", post(search_handler))
            .route("/ws/status", get(ws_status_handler))
            .with_state(self.state.clone());

        if let Some(handle) = &self.metrics_handle {
            let handle = handle.clone();
            router = router.route("/metrics", get(move || async move { handle.render() }));
        }

        router
            .layer(self.cors_layer())
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server.
    pub async fn run(self) -> Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::gateway(format!("Failed to bind {}: {}", addr, e)))?;

        tracing::info!(addr = %addr, "Gateway server starting");

        axum::serve(listener, self.build_router())
            .await
            .map_err(|e| Error::gateway(format!("Server error: {}", e)))?;

        Ok(())
    }
}

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error body: `{"status": <code>, "message": <text>}`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
}

/// Maps core errors onto HTTP responses.
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::AlreadyRunning(_) | Error::InvalidState(_) | Error::QuestionPending(_) => {
                StatusCode::CONFLICT
            }
            Error::InvalidRequest(_) | Error::Serialization(_) => StatusCode::BAD_REQUEST,
            Error::ModelProvider(_) | Error::Browser(_) => StatusCode::BAD_GATEWAY,
            Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Error::NoOperatorConnected | Error::ConnectionLost => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }
        (
            status,
            Json(ErrorResponse {
                status: self.0.code().to_string(),
                message: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(state.service.status())
}

async fn run_task_handler(
    State(state): State<AppState>,
    Json(request): Json<TaskRequest>,
) -> std::result::Result<Json<TaskResponse>, ApiError> {
    Ok(Json(state.service.run_task(request).await?))
}

async fn stop_task_handler(State(state): State<AppState>) -> Json<ControlResponse> {
    Json(state.service.stop_task())
}

async fn pause_task_handler(State(state): State<AppState>) -> Json<ControlResponse> {
    Json(state.service.pause_task())
}

async fn resume_task_handler(State(state): State<AppState>) -> Json<ControlResponse> {
    Json(state.service.resume_task())
}

async fn search_handler(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> std::result::Result<Json<SearchResponse>, ApiError> {
    Ok(Json(state.service.search(&request.query).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_already_running_is_conflict() {
        let response = ApiError(Error::already_running("book a flight")).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
