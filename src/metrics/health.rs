//! Health check endpoints and Prometheus metrics server
//!
//! HTTP endpoints for health checks and Prometheus scraping, served with Axum.

use crate::metrics::collector::MetricsCollector;
use crate::service::app::AppState;
use crate::service::health::{HealthCheck, HealthStatus};
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

const SERVICE_NAME: &str = "keymaster";
const NOT_INITIALIZED: &str = "Service not initialized";
const ENDPOINTS: [&str; 5] = ["/health", "/ready", "/alive", "/metrics", "/stats"];

/// Where the health server listens
#[derive(Debug, Clone)]
pub struct HealthServerConfig {
    pub port: u16,
    pub host: String,
}

impl HealthServerConfig {
    pub fn address(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid health server address {}:{}", self.host, self.port))
    }
}

impl Default for HealthServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct HealthServerState {
    pub metrics_collector: Arc<MetricsCollector>,
    /// Absent until the bot is wired up; every check fails meanwhile
    pub app_state: Option<Arc<AppState>>,
}

/// Health and scrape endpoints: `/health`, `/ready`, `/alive`, `/metrics`, `/stats`
pub struct HealthServer {
    config: HealthServerConfig,
    state: HealthServerState,
    shutdown_tx: broadcast::Sender<()>,
}

impl HealthServer {
    pub fn new(config: HealthServerConfig, metrics_collector: Arc<MetricsCollector>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            state: HealthServerState {
                metrics_collector,
                app_state: None,
            },
            shutdown_tx,
        }
    }

    pub fn with_app_state(mut self, app_state: Arc<AppState>) -> Self {
        self.state.app_state = Some(app_state);
        self
    }

    /// Serve until [`HealthServer::stop`] is called
    pub async fn start(&self) -> Result<()> {
        let addr = self.config.address()?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind health server to {}", addr))?;
        info!("📡 Health server listening on http://{}", addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await
            .context("Health server failed")?;

        info!("Health server stopped");
        Ok(())
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/", get(root_handler))
            .route("/health", get(health_handler))
            .route("/ready", get(ready_handler))
            .route("/alive", get(alive_handler))
            .route("/metrics", get(metrics_handler))
            .route("/stats", get(stats_handler))
            .with_state(self.state.clone())
    }

    pub async fn stop(&self) -> Result<()> {
        // No receiver means the server never started or already stopped
        if self.shutdown_tx.send(()).is_err() {
            warn!("Health server was not running");
        }
        Ok(())
    }
}

fn service_json(status: impl Serialize) -> serde_json::Value {
    json!({
        "name": SERVICE_NAME,
        "version": crate::VERSION,
        "status": status,
    })
}

/// Run a health check; an absent app state or a failed check counts as unhealthy
async fn run_check(app_state: Option<&Arc<AppState>>, readiness: bool) -> HealthStatus {
    let Some(app_state) = app_state else {
        return HealthStatus::Unhealthy;
    };

    let checked = if readiness {
        HealthCheck::readiness_check(app_state.clone()).await
    } else {
        HealthCheck::liveness_check(app_state.clone()).await
    };

    checked.unwrap_or_else(|e| {
        error!("Health check failed: {:#}", e);
        HealthStatus::Unhealthy
    })
}

fn status_code(status: &HealthStatus) -> StatusCode {
    match status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
    }
}

async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "service": service_json("running"),
        "endpoints": ENDPOINTS,
    }))
}

async fn health_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    let status = run_check(state.app_state.as_ref(), false).await;
    let mut body = json!({ "service": service_json(&status) });
    if state.app_state.is_none() {
        body["error"] = json!(NOT_INITIALIZED);
    }
    (status_code(&status), Json(body))
}

async fn ready_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    let status = run_check(state.app_state.as_ref(), true).await;
    let text = match status {
        HealthStatus::Healthy => "Ready",
        HealthStatus::Degraded => "Degraded but ready",
        HealthStatus::Unhealthy => "Not ready",
    };
    (status_code(&status), text)
}

async fn alive_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    match run_check(state.app_state.as_ref(), false).await {
        HealthStatus::Healthy => (StatusCode::OK, "Alive"),
        _ => (StatusCode::SERVICE_UNAVAILABLE, "Not alive"),
    }
}

/// Prometheus text exposition of every registered family
pub fn encode_metrics(collector: &MetricsCollector) -> Result<String> {
    let families = collector.registry().gather();
    TextEncoder::new()
        .encode_to_string(&families)
        .context("Failed to encode metrics")
}

async fn metrics_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    match encode_metrics(&state.metrics_collector) {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, TextEncoder::new().format_type().to_string())],
            text,
        )
            .into_response(),
        Err(e) => {
            error!("{:#}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
        }
    }
}

/// Registered users, cached profiles, open groups and component checks
async fn stats_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    let Some(app_state) = &state.app_state else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "service": service_json("error"),
                "error": NOT_INITIALIZED,
                "timestamp": chrono::Utc::now(),
            })),
        );
    };

    match HealthCheck::check(app_state.clone()).await {
        Ok(health) => {
            let mut service = service_json(&health.status);
            service["uptime"] = json!(health.stats.uptime_info);
            (
                StatusCode::OK,
                Json(json!({
                    "service": service,
                    "users": {
                        "registered": health.stats.registered_users,
                        "cached_profiles": health.stats.cache_entries,
                    },
                    "groups": { "active": health.stats.active_sessions },
                    "components": health.checks,
                    "timestamp": chrono::Utc::now(),
                })),
            )
        }
        Err(e) => {
            warn!("Stats unavailable: {:#}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "service": service_json("error"),
                    "error": format!("{:#}", e),
                    "timestamp": chrono::Utc::now(),
                })),
            )
        }
    }
}
