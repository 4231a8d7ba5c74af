//! Main application state and service coordination
//!
//! `AppState` owns every long-lived component (storage, cache, ranking client,
//! profile service, group finder manager, metrics) and the background tasks
//! that maintain them. The Discord handler holds it behind an `Arc`.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::cache::StatsCache;
use crate::config::AppConfig;
use crate::lfg::LfgManager;
use crate::metrics::health::HealthServerConfig;
use crate::metrics::{HealthServer, MetricsCollector};
use crate::ranking::{RankingClient, RankingProvider};
use crate::service::profile::ProfileService;
use crate::storage::{SqliteStorage, Storage};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {message}")]
    Database { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    storage: Arc<dyn Storage>,
    cache: Arc<StatsCache>,
    ranking: Arc<dyn RankingProvider>,
    profiles: Arc<ProfileService>,
    lfg: Arc<LfgManager>,

    /// Prometheus metrics shared with the health server
    metrics: Arc<MetricsCollector>,

    /// Health server, present while running
    health_server: Mutex<Option<Arc<HealthServer>>>,

    /// Background task handles
    background_tasks: Mutex<Vec<JoinHandle<()>>>,

    /// Service status
    is_running: Arc<RwLock<bool>>,

    started_at: Instant,
}

impl AppState {
    /// Initialize the application with all dependencies
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing {}", config.service.name);
        debug!("Configuration: {:?}", config);

        let metrics = Arc::new(MetricsCollector::new().map_err(|e| {
            ServiceError::Initialization {
                message: format!("Failed to create metrics collector: {}", e),
            }
        })?);

        let storage = SqliteStorage::connect(&config.database)
            .await
            .map_err(|e| ServiceError::Database {
                message: format!("{:#}", e),
            })?;
        storage
            .create_tables()
            .await
            .map_err(|e| ServiceError::Database {
                message: format!("{:#}", e),
            })?;

        let ranking = RankingClient::new(&config.ranking)
            .map_err(|e| ServiceError::Initialization {
                message: format!("Failed to create ranking client: {:#}", e),
            })?
            .with_metrics(metrics.clone());

        Ok(Self::from_parts(
            config,
            Arc::new(storage),
            Arc::new(ranking),
            metrics,
        ))
    }

    /// Assemble the state from ready-made components
    pub fn from_parts(
        config: AppConfig,
        storage: Arc<dyn Storage>,
        ranking: Arc<dyn RankingProvider>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let cache = Arc::new(StatsCache::from_settings(&config.cache));

        let profiles = Arc::new(
            ProfileService::new(storage.clone(), cache.clone(), ranking.clone())
                .with_affix_locale(config.ranking.affix_locale.clone()),
        );

        let lfg = Arc::new(
            LfgManager::new(
                storage.clone(),
                cache.clone(),
                ranking.clone(),
                config.lfg_refresh_timeout(),
            )
            .with_metrics(metrics.clone()),
        );

        Self {
            config,
            storage,
            cache,
            ranking,
            profiles,
            lfg,
            metrics,
            health_server: Mutex::new(None),
            background_tasks: Mutex::new(Vec::new()),
            is_running: Arc::new(RwLock::new(false)),
            started_at: Instant::now(),
        }
    }

    /// Restore sessions and start the health server and background tasks
    pub async fn start(self: &Arc<Self>) -> Result<(), ServiceError> {
        info!("Starting {}", self.config.service.name);
        *self.is_running.write().await = true;

        match self.lfg.restore().await {
            Ok(count) => info!("Restored {} group finder sessions", count),
            Err(e) => warn!("Failed to restore group finder sessions: {:#}", e),
        }

        self.start_health_server().await;
        self.start_background_tasks().await;

        info!("✅ {} started successfully", self.config.service.name);
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown");
        *self.is_running.write().await = false;

        self.stop_background_tasks().await;

        if tokio::time::timeout(self.config.shutdown_timeout(), self.lfg.drain_refreshes())
            .await
            .is_err()
        {
            warn!("Background refreshes did not finish before the shutdown timeout");
        }

        if let Some(server) = self.health_server.lock().await.take() {
            if let Err(e) = server.stop().await {
                warn!("Failed to stop health server: {}", e);
            }
        }

        info!(
            "Final state: {} open groups, {} cached profiles",
            self.lfg.session_count(),
            self.cache.len()
        );
        info!("✅ Shutdown completed");
        Ok(())
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub fn storage(&self) -> Arc<dyn Storage> {
        self.storage.clone()
    }

    pub fn cache(&self) -> Arc<StatsCache> {
        self.cache.clone()
    }

    pub fn ranking(&self) -> Arc<dyn RankingProvider> {
        self.ranking.clone()
    }

    pub fn profiles(&self) -> Arc<ProfileService> {
        self.profiles.clone()
    }

    pub fn lfg(&self) -> Arc<LfgManager> {
        self.lfg.clone()
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    async fn start_health_server(self: &Arc<Self>) {
        let port = self.config.service.health_port;
        if port == 0 {
            info!("Health server disabled");
            return;
        }

        let config = HealthServerConfig {
            port,
            host: "0.0.0.0".to_string(),
        };
        let server = Arc::new(
            HealthServer::new(config, self.metrics.clone()).with_app_state(self.clone()),
        );
        *self.health_server.lock().await = Some(server.clone());

        let handle = tokio::spawn(async move {
            if let Err(e) = server.start().await {
                error!("Health server failed: {}", e);
            }
        });
        self.background_tasks.lock().await.push(handle);
        info!("✅ Health endpoints started on port {}", port);
    }

    /// Start background maintenance tasks
    async fn start_background_tasks(&self) {
        let mut tasks = self.background_tasks.lock().await;

        // Periodic profile refresh
        if self.config.refresh.enabled {
            let profiles = self.profiles.clone();
            let is_running = self.is_running.clone();
            let every = self.config.refresh_interval();
            let pause = self.config.refresh_pause();
            info!("Starting profile refresh task ({}s interval)", every.as_secs());

            tasks.push(tokio::spawn(async move {
                let mut interval = tokio::time::interval(every);
                interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

                while *is_running.read().await {
                    interval.tick().await;
                    if let Err(e) = profiles.refresh_all(pause).await {
                        warn!("Profile refresh failed: {:#}", e);
                    }
                }
                info!("Profile refresh task stopped");
            }));
        } else {
            info!("Profile refresh disabled");
        }

        // Expired cache entry sweep
        {
            let cache = self.cache.clone();
            let metrics = self.metrics.clone();
            let is_running = self.is_running.clone();
            let every = self.config.cache_sweep_interval();

            tasks.push(tokio::spawn(async move {
                let mut interval = tokio::time::interval(every);
                while *is_running.read().await {
                    interval.tick().await;
                    let purged = cache.purge_expired();
                    metrics.record_cache_sweep(purged, cache.len());
                }
                debug!("Cache sweep task stopped");
            }));
        }

        // Service health metrics
        {
            let metrics = self.metrics.clone();
            let storage = self.storage.clone();
            let lfg = self.lfg.clone();
            let is_running = self.is_running.clone();
            let started_at = self.started_at;

            tasks.push(tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(60));
                while *is_running.read().await {
                    interval.tick().await;

                    metrics
                        .service()
                        .uptime_seconds
                        .set(started_at.elapsed().as_secs() as i64);
                    metrics.set_active_sessions(lfg.session_count());

                    let database_ok = match storage.count_users().await {
                        Ok(count) => {
                            metrics.service().registered_users.set(count as i64);
                            true
                        }
                        Err(e) => {
                            warn!("Database health check failed: {:#}", e);
                            false
                        }
                    };
                    metrics.update_component_health("database", database_ok);
                    metrics.update_health_status(if database_ok { 2 } else { 1 });
                }
                debug!("Health metrics task stopped");
            }));
        }

        info!("{} background tasks running", tasks.len());
    }

    /// Stop all background tasks
    async fn stop_background_tasks(&self) {
        let mut tasks = self.background_tasks.lock().await;
        let count = tasks.len();
        if count == 0 {
            return;
        }

        info!("Stopping {} background tasks...", count);
        for task in tasks.drain(..) {
            task.abort();
        }
        info!("✅ All {} background tasks stopped", count);
    }
}
