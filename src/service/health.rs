//! Service health reporting
//!
//! Liveness only asks whether the service loop runs. Readiness also needs
//! the database, since every command reads or writes it. The full report
//! adds the ranking gate and a few counters.

use crate::service::app::AppState;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// The more severe of the two
    pub fn worst(self, other: HealthStatus) -> HealthStatus {
        self.max(other)
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "✅ healthy"),
            HealthStatus::Degraded => write!(f, "⚠️  degraded"),
            HealthStatus::Unhealthy => write!(f, "❌ unhealthy"),
        }
    }
}

/// Full health report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    pub status: HealthStatus,
    pub service: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub checks: Vec<ComponentCheck>,
    pub stats: ServiceStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    pub name: String,
    pub status: HealthStatus,
    /// Why the component is not healthy
    pub message: Option<String>,
    pub duration_ms: u64,
}

impl ComponentCheck {
    fn timed(name: &str, started: Instant, status: HealthStatus, message: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            status,
            message,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStats {
    pub registered_users: u64,
    pub active_sessions: usize,
    pub cache_entries: usize,
    pub uptime_info: String,
}

impl HealthCheck {
    /// Run every component check; a stopped service is unhealthy regardless
    pub async fn check(app_state: Arc<AppState>) -> Result<Self> {
        let checks = vec![
            Self::check_service_running(&app_state).await,
            Self::check_database(&app_state).await,
            Self::check_ranking_gate(&app_state),
        ];
        let status = checks
            .iter()
            .fold(HealthStatus::Healthy, |overall, check| overall.worst(check.status));

        Ok(HealthCheck {
            status,
            service: app_state.config().service.name.clone(),
            version: crate::VERSION.to_string(),
            timestamp: Utc::now(),
            checks,
            stats: Self::gather_service_stats(&app_state).await,
        })
    }

    pub async fn liveness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        Ok(Self::check_service_running(&app_state).await.status)
    }

    pub async fn readiness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        let running = Self::check_service_running(&app_state).await.status;
        if running == HealthStatus::Unhealthy {
            return Ok(running);
        }
        Ok(running.worst(Self::check_database(&app_state).await.status))
    }

    async fn check_service_running(app_state: &AppState) -> ComponentCheck {
        let started = Instant::now();
        if app_state.is_running().await {
            ComponentCheck::timed("service_running", started, HealthStatus::Healthy, None)
        } else {
            ComponentCheck::timed(
                "service_running",
                started,
                HealthStatus::Unhealthy,
                Some("Service is not running".to_string()),
            )
        }
    }

    async fn check_database(app_state: &AppState) -> ComponentCheck {
        let started = Instant::now();
        match app_state.storage().ping().await {
            Ok(()) => ComponentCheck::timed("database", started, HealthStatus::Healthy, None),
            Err(e) => {
                error!("Database health check failed: {:#}", e);
                ComponentCheck::timed(
                    "database",
                    started,
                    HealthStatus::Unhealthy,
                    Some(format!("Database unreachable: {}", e)),
                )
            }
        }
    }

    /// Degraded while every ranking request permit is taken
    fn check_ranking_gate(app_state: &AppState) -> ComponentCheck {
        let started = Instant::now();
        let in_flight = app_state.metrics().ranking().in_flight.get();
        let limit = app_state.config().ranking.max_concurrent_requests as i64;

        if in_flight >= limit {
            ComponentCheck::timed(
                "ranking_api",
                started,
                HealthStatus::Degraded,
                Some(format!("{} of {} ranking requests in flight", in_flight, limit)),
            )
        } else {
            ComponentCheck::timed("ranking_api", started, HealthStatus::Healthy, None)
        }
    }

    async fn gather_service_stats(app_state: &AppState) -> ServiceStats {
        let uptime = app_state.uptime().as_secs();
        ServiceStats {
            registered_users: app_state.storage().count_users().await.unwrap_or(0),
            active_sessions: app_state.lfg().session_count(),
            cache_entries: app_state.cache().len(),
            uptime_info: format!(
                "Up {}h {}m {}s",
                uptime / 3600,
                (uptime % 3600) / 60,
                uptime % 60
            ),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
