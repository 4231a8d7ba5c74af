//! Metrics collection using Prometheus
//!
//! Command, ranking API, cache and group finder metrics for the bot.

use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::types::Role;

/// Main metrics collector for the bot
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Slash command metrics
    command_metrics: CommandMetrics,

    /// Ranking API metrics
    ranking_metrics: RankingMetrics,

    /// Stats cache metrics
    cache_metrics: CacheMetrics,

    /// Group finder metrics
    lfg_metrics: LfgMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,

    /// Registered users in storage
    pub registered_users: IntGauge,
}

/// Slash command metrics
#[derive(Clone)]
pub struct CommandMetrics {
    /// Commands handled by name and outcome
    pub commands_total: IntCounterVec,

    /// Command handling time
    pub command_duration: HistogramVec,
}

/// Ranking API metrics
#[derive(Clone)]
pub struct RankingMetrics {
    /// Logical API calls by endpoint and outcome
    pub requests_total: IntCounterVec,

    /// Retried attempts by endpoint
    pub retries_total: IntCounterVec,

    /// Time for a logical call including backoff
    pub request_duration: HistogramVec,

    /// Calls currently holding a concurrency permit
    pub in_flight: IntGauge,
}

/// Stats cache metrics
#[derive(Clone)]
pub struct CacheMetrics {
    /// Lookups by result (hit, miss)
    pub lookups_total: IntCounterVec,

    /// Entries currently stored
    pub entries: IntGauge,

    /// Expired entries removed by the sweeper
    pub purged_total: IntCounter,
}

/// Group finder metrics
#[derive(Clone)]
pub struct LfgMetrics {
    /// Sessions currently open in memory
    pub active_sessions: IntGauge,

    /// Sessions opened
    pub sessions_opened_total: IntCounter,

    /// Button presses by outcome
    pub presses_total: IntCounterVec,

    /// Full-group announcements sent
    pub announcements_total: IntCounter,

    /// Background stats refreshes by outcome
    pub refreshes_total: IntCounterVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let command_metrics = CommandMetrics::new(&registry)?;
        let ranking_metrics = RankingMetrics::new(&registry)?;
        let cache_metrics = CacheMetrics::new(&registry)?;
        let lfg_metrics = LfgMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            command_metrics,
            ranking_metrics,
            cache_metrics,
            lfg_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    pub fn commands(&self) -> &CommandMetrics {
        &self.command_metrics
    }

    pub fn ranking(&self) -> &RankingMetrics {
        &self.ranking_metrics
    }

    pub fn cache(&self) -> &CacheMetrics {
        &self.cache_metrics
    }

    pub fn lfg(&self) -> &LfgMetrics {
        &self.lfg_metrics
    }

    /// Record a handled slash command
    pub fn record_command(&self, command: &str, success: bool, duration: Duration) {
        let outcome = if success { "success" } else { "error" };

        self.command_metrics
            .commands_total
            .with_label_values(&[command, outcome])
            .inc();

        self.command_metrics
            .command_duration
            .with_label_values(&[command])
            .observe(duration.as_secs_f64());
    }

    /// Record a finished logical ranking API call
    pub fn record_ranking_request(&self, endpoint: &str, outcome: &str, duration: Duration) {
        self.ranking_metrics
            .requests_total
            .with_label_values(&[endpoint, outcome])
            .inc();

        self.ranking_metrics
            .request_duration
            .with_label_values(&[endpoint])
            .observe(duration.as_secs_f64());
    }

    pub fn record_ranking_retry(&self, endpoint: &str) {
        self.ranking_metrics
            .retries_total
            .with_label_values(&[endpoint])
            .inc();
    }

    pub fn record_cache_lookup(&self, hit: bool) {
        let result = if hit { "hit" } else { "miss" };
        self.cache_metrics
            .lookups_total
            .with_label_values(&[result])
            .inc();
    }

    pub fn record_cache_sweep(&self, purged: usize, remaining: usize) {
        self.cache_metrics.purged_total.inc_by(purged as u64);
        self.cache_metrics.entries.set(remaining as i64);
    }

    pub fn record_session_opened(&self) {
        self.lfg_metrics.sessions_opened_total.inc();
        self.lfg_metrics.active_sessions.inc();
    }

    pub fn record_session_closed(&self) {
        self.lfg_metrics.active_sessions.dec();
    }

    pub fn set_active_sessions(&self, count: usize) {
        self.lfg_metrics.active_sessions.set(count as i64);
    }

    /// Record a button press; `role` is absent for presses that touched no role
    pub fn record_press(&self, outcome: &str, role: Option<Role>) {
        let role = role.map(|r| r.slug()).unwrap_or("none");
        self.lfg_metrics
            .presses_total
            .with_label_values(&[outcome, role])
            .inc();
    }

    pub fn record_announcement(&self) {
        self.lfg_metrics.announcements_total.inc();
    }

    pub fn record_refresh(&self, outcome: &str) {
        self.lfg_metrics
            .refreshes_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds = IntGauge::new("keymaster_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "keymaster_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("keymaster_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        let registered_users =
            IntGauge::new("keymaster_registered_users", "Registered users in storage")?;
        registry.register(Box::new(registered_users.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
            component_health,
            registered_users,
        })
    }
}

impl CommandMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let commands_total = IntCounterVec::new(
            Opts::new("keymaster_commands_total", "Slash commands handled"),
            &["command", "outcome"],
        )?;
        registry.register(Box::new(commands_total.clone()))?;

        let command_duration = HistogramVec::new(
            HistogramOpts::new(
                "keymaster_command_duration_seconds",
                "Slash command handling time",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 15.0]),
            &["command"],
        )?;
        registry.register(Box::new(command_duration.clone()))?;

        Ok(Self {
            commands_total,
            command_duration,
        })
    }
}

impl RankingMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let requests_total = IntCounterVec::new(
            Opts::new("keymaster_ranking_requests_total", "Ranking API calls"),
            &["endpoint", "outcome"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let retries_total = IntCounterVec::new(
            Opts::new("keymaster_ranking_retries_total", "Ranking API retries"),
            &["endpoint"],
        )?;
        registry.register(Box::new(retries_total.clone()))?;

        let request_duration = HistogramVec::new(
            HistogramOpts::new(
                "keymaster_ranking_request_duration_seconds",
                "Ranking API call time including backoff",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
            &["endpoint"],
        )?;
        registry.register(Box::new(request_duration.clone()))?;

        let in_flight = IntGauge::new(
            "keymaster_ranking_in_flight",
            "Ranking API calls holding a permit",
        )?;
        registry.register(Box::new(in_flight.clone()))?;

        Ok(Self {
            requests_total,
            retries_total,
            request_duration,
            in_flight,
        })
    }
}

impl CacheMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let lookups_total = IntCounterVec::new(
            Opts::new("keymaster_cache_lookups_total", "Stats cache lookups"),
            &["result"],
        )?;
        registry.register(Box::new(lookups_total.clone()))?;

        let entries = IntGauge::new("keymaster_cache_entries", "Stats cache entries")?;
        registry.register(Box::new(entries.clone()))?;

        let purged_total = IntCounter::new(
            "keymaster_cache_purged_total",
            "Expired stats cache entries removed",
        )?;
        registry.register(Box::new(purged_total.clone()))?;

        Ok(Self {
            lookups_total,
            entries,
            purged_total,
        })
    }
}

impl LfgMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let active_sessions = IntGauge::new(
            "keymaster_lfg_active_sessions",
            "Group finder sessions in memory",
        )?;
        registry.register(Box::new(active_sessions.clone()))?;

        let sessions_opened_total = IntCounter::new(
            "keymaster_lfg_sessions_opened_total",
            "Group finder sessions opened",
        )?;
        registry.register(Box::new(sessions_opened_total.clone()))?;

        let presses_total = IntCounterVec::new(
            Opts::new("keymaster_lfg_presses_total", "Group finder button presses"),
            &["outcome", "role"],
        )?;
        registry.register(Box::new(presses_total.clone()))?;

        let announcements_total = IntCounter::new(
            "keymaster_lfg_announcements_total",
            "Full group announcements",
        )?;
        registry.register(Box::new(announcements_total.clone()))?;

        let refreshes_total = IntCounterVec::new(
            Opts::new(
                "keymaster_lfg_refreshes_total",
                "Background stats refreshes",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(refreshes_total.clone()))?;

        Ok(Self {
            active_sessions,
            sessions_opened_total,
            presses_total,
            announcements_total,
            refreshes_total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collector_creation() {
        let collector = MetricsCollector::new().unwrap();
        assert!(!collector.registry().gather().is_empty());
    }

    #[test]
    fn test_record_command() {
        let collector = MetricsCollector::new().unwrap();
        collector.record_command("register", true, Duration::from_millis(120));
        collector.record_command("register", false, Duration::from_millis(40));

        let ok = collector
            .commands()
            .commands_total
            .with_label_values(&["register", "success"])
            .get();
        let failed = collector
            .commands()
            .commands_total
            .with_label_values(&["register", "error"])
            .get();
        assert_eq!(ok, 1);
        assert_eq!(failed, 1);
    }

    #[test]
    fn test_session_gauge() {
        let collector = MetricsCollector::new().unwrap();
        collector.record_session_opened();
        collector.record_session_opened();
        collector.record_session_closed();
        assert_eq!(collector.lfg().active_sessions.get(), 1);
        assert_eq!(collector.lfg().sessions_opened_total.get(), 2);
    }

    #[test]
    fn test_press_and_cache_counters() {
        let collector = MetricsCollector::new().unwrap();
        collector.record_press("joined", Some(Role::Dps));
        collector.record_press("closed", None);
        collector.record_cache_lookup(true);
        collector.record_cache_sweep(3, 7);

        assert_eq!(
            collector
                .lfg()
                .presses_total
                .with_label_values(&["joined", "dps"])
                .get(),
            1
        );
        assert_eq!(
            collector
                .cache()
                .lookups_total
                .with_label_values(&["hit"])
                .get(),
            1
        );
        assert_eq!(collector.cache().purged_total.get(), 3);
        assert_eq!(collector.cache().entries.get(), 7);
    }

    #[test]
    fn test_timer() {
        let collector = MetricsCollector::new().unwrap();
        let timer = collector.start_timer();
        std::thread::sleep(Duration::from_millis(5));
        assert!(timer.stop() >= Duration::from_millis(5));
    }
}
