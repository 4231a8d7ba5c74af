//! Raider.IO client with bounded concurrency and retry
//!
//! Every logical call holds one permit of a process-wide semaphore for its
//! whole duration, backoff sleeps included, so at most `max_concurrent`
//! calls are ever in flight against the API.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::RankingSettings;
use crate::error::{KeymasterError, Result};
use crate::metrics::MetricsCollector;
use crate::ranking::models::{AffixSchedule, CharacterProfile};
use crate::ranking::retry::{classify_status, RetryPolicy, StatusClass};
use crate::ranking::transport::{HttpTransport, ReqwestTransport};
use crate::types::Region;

/// Fields requested with every profile lookup
pub const PROFILE_FIELDS: &str = "gear,guild,mythic_plus_scores_by_season:current,mythic_plus_best_runs,mythic_plus_weekly_highest_level_runs";

/// Source of character profiles and affix schedules
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RankingProvider: Send + Sync {
    /// Fetch a character profile; `Ok(None)` when the character does not exist
    async fn fetch_character(
        &self,
        name: &str,
        realm: &str,
        region: Region,
    ) -> Result<Option<CharacterProfile>>;

    /// Fetch the current affix rotation for a region
    async fn fetch_weekly_affixes(
        &self,
        region: Region,
        locale: &str,
    ) -> Result<Option<AffixSchedule>>;
}

/// HTTP implementation of [`RankingProvider`]
pub struct RankingClient {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    gate: Arc<Semaphore>,
    retry: RetryPolicy,
    metrics: Option<Arc<MetricsCollector>>,
}

impl RankingClient {
    /// Create a client talking to the real API
    pub fn new(settings: &RankingSettings) -> Result<Self> {
        let transport = ReqwestTransport::new(std::time::Duration::from_secs(
            settings.request_timeout_seconds,
        ))?;
        Ok(Self::with_transport(Arc::new(transport), settings))
    }

    pub fn with_transport(transport: Arc<dyn HttpTransport>, settings: &RankingSettings) -> Self {
        Self {
            transport,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            gate: Arc::new(Semaphore::new(settings.max_concurrent_requests.max(1))),
            retry: RetryPolicy::from_settings(settings),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Permits not currently held by a call
    pub fn available_permits(&self) -> usize {
        self.gate.available_permits()
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<T>> {
        let started = Instant::now();
        let result = self.get_with_retry(endpoint, url, query).await;

        let result = match result {
            Ok(Some(body)) => serde_json::from_str::<T>(&body).map(Some).map_err(|e| {
                anyhow::Error::from(KeymasterError::MalformedResponse {
                    message: format!("{} payload: {}", endpoint, e),
                })
            }),
            Ok(None) => Ok(None),
            Err(e) => Err(e),
        };

        if let Some(metrics) = &self.metrics {
            let outcome = match &result {
                Ok(Some(_)) => "success",
                Ok(None) => "not_found",
                Err(e) => match e.downcast_ref::<KeymasterError>() {
                    Some(KeymasterError::RankingUnavailable { .. }) => "unavailable",
                    Some(KeymasterError::MalformedResponse { .. }) => "malformed",
                    _ => "failed",
                },
            };
            metrics.record_ranking_request(endpoint, outcome, started.elapsed());
        }

        result
    }

    /// Run one logical call: `Some(body)` on 2xx, `None` on 400/404
    async fn get_with_retry(
        &self,
        endpoint: &'static str,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<String>> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| KeymasterError::InternalError {
                message: "ranking client semaphore closed".to_string(),
            })?;
        let _in_flight = InFlightGuard::new(self.metrics.as_deref());

        let mut attempt = 0u32;
        loop {
            attempt += 1;

            let failure = match self.transport.get(url, query).await {
                Ok(response) => match classify_status(response.status) {
                    StatusClass::Success => return Ok(Some(response.body)),
                    StatusClass::NotFound => {
                        debug!("{} returned {} for {:?}", endpoint, response.status, query);
                        return Ok(None);
                    }
                    StatusClass::Fatal => {
                        warn!("{} rejected request with status {}", endpoint, response.status);
                        return Err(KeymasterError::RankingRequestFailed {
                            status: response.status,
                            message: truncate(&response.body, 200),
                        }
                        .into());
                    }
                    StatusClass::Transient => format!("status {}", response.status),
                },
                Err(e) => format!("{:#}", e),
            };

            if attempt >= self.retry.max_attempts {
                warn!(
                    "{} unavailable after {} attempts: {}",
                    endpoint, attempt, failure
                );
                return Err(KeymasterError::RankingUnavailable {
                    attempts: attempt,
                    message: failure,
                }
                .into());
            }

            let delay = self.retry.next_delay(attempt);
            info!(
                "{} attempt {}/{} failed ({}), retrying in {:?}",
                endpoint, attempt, self.retry.max_attempts, failure, delay
            );
            if let Some(metrics) = &self.metrics {
                metrics.record_ranking_retry(endpoint);
            }
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl RankingProvider for RankingClient {
    async fn fetch_character(
        &self,
        name: &str,
        realm: &str,
        region: Region,
    ) -> Result<Option<CharacterProfile>> {
        let url = format!("{}/characters/profile", self.base_url);
        let query = [
            ("region", region.slug()),
            ("realm", realm),
            ("name", name),
            ("fields", PROFILE_FIELDS),
        ];
        self.get_json("character_profile", &url, &query).await
    }

    async fn fetch_weekly_affixes(
        &self,
        region: Region,
        locale: &str,
    ) -> Result<Option<AffixSchedule>> {
        let url = format!("{}/mythic-plus/affixes", self.base_url);
        let query = [("region", region.slug()), ("locale", locale)];
        self.get_json("affixes", &url, &query).await
    }
}

/// Keeps the in-flight gauge honest on every exit path
struct InFlightGuard<'a> {
    metrics: Option<&'a MetricsCollector>,
}

impl<'a> InFlightGuard<'a> {
    fn new(metrics: Option<&'a MetricsCollector>) -> Self {
        if let Some(m) = metrics {
            m.ranking().in_flight.inc();
        }
        Self { metrics }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Some(m) = self.metrics {
            m.ranking().in_flight.dec();
        }
    }
}

fn truncate(body: &str, max_chars: usize) -> String {
    body.chars().take(max_chars).collect()
}
