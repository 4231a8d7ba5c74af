//! Metrics and monitoring for the KeyMaster bot
//!
//! Prometheus collectors for commands, ranking requests, the stats cache and
//! the group finder, plus the HTTP server that exposes them.

pub mod collector;
pub mod health;

pub use collector::{
    CacheMetrics, CommandMetrics, LfgMetrics, MetricsCollector, MetricsTimer, RankingMetrics,
    ServiceMetrics,
};
pub use health::{encode_metrics, HealthServer, HealthServerConfig};
