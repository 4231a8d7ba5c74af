//! Group finder session manager
//!
//! Owns every open session, persists slot changes, resolves occupant stats
//! (cache first, then the stored profile) and runs the background refreshes
//! that keep the cache warm.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::cache::StatsCache;
use crate::error::{KeymasterError, Result};
use crate::lfg::render::SessionView;
use crate::lfg::session::{LfgListing, LfgSession, PressOutcome};
use crate::metrics::MetricsCollector;
use crate::ranking::RankingProvider;
use crate::storage::Storage;
use crate::types::{CharacterRef, CharacterStats, ChannelId, MessageId, Role, UserId};

/// Result of a press, ready for the Discord layer to act on
#[derive(Debug, Clone)]
pub struct PressReply {
    pub outcome: PressOutcome,
    pub view: SessionView,
    /// Set once per fill event
    pub announcement: Option<String>,
}

/// Manages group finder sessions and their durable state
pub struct LfgManager {
    sessions: Mutex<HashMap<MessageId, LfgSession>>,
    /// Groups closed during this run; never hydrated again even if their row survives
    closed: Mutex<HashSet<MessageId>>,
    storage: Arc<dyn Storage>,
    cache: Arc<StatsCache>,
    ranking: Arc<dyn RankingProvider>,
    refresh_timeout: Duration,
    metrics: Option<Arc<MetricsCollector>>,
    refreshes: Mutex<JoinSet<()>>,
    refreshing: Arc<Mutex<HashSet<UserId>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl LfgManager {
    pub fn new(
        storage: Arc<dyn Storage>,
        cache: Arc<StatsCache>,
        ranking: Arc<dyn RankingProvider>,
        refresh_timeout: Duration,
    ) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            closed: Mutex::new(HashSet::new()),
            storage,
            cache,
            ranking,
            refresh_timeout,
            metrics: None,
            refreshes: Mutex::new(JoinSet::new()),
            refreshing: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Number of sessions held in memory
    pub fn session_count(&self) -> usize {
        lock(&self.sessions).len()
    }

    /// Snapshot of a session, if it is held in memory
    pub fn session(&self, message_id: MessageId) -> Option<LfgSession> {
        lock(&self.sessions).get(&message_id).cloned()
    }

    /// Start tracking a new listing message and persist it
    pub async fn open_session(
        &self,
        message_id: MessageId,
        channel_id: ChannelId,
        owner_id: UserId,
        listing: LfgListing,
    ) -> Result<SessionView> {
        let session = LfgSession::new(message_id, channel_id, owner_id, listing);
        let record = session.to_record()?;

        lock(&self.sessions).insert(message_id, session.clone());
        if let Some(metrics) = &self.metrics {
            metrics.record_session_opened();
        }

        if let Err(e) = self.storage.save_lfg(&record).await {
            warn!("Failed to persist group {}: {:#}", message_id, e);
        }

        info!(
            "Opened group {} for {} (leader {})",
            message_id,
            session.listing.title(),
            owner_id
        );
        Ok(self.render(&session).await)
    }

    /// Apply a role button press
    pub async fn press(&self, message_id: MessageId, user: UserId, role: Role) -> Result<PressReply> {
        self.ensure_loaded(message_id).await?;

        let (result, session) = {
            let mut sessions = lock(&self.sessions);
            let session = sessions
                .get_mut(&message_id)
                .ok_or(KeymasterError::SessionNotFound { message_id })?;
            let result = session.press(user, role);
            (result, session.clone())
        };

        debug!(
            "Group {}: user {} pressed {} -> {:?}",
            message_id, user, role, result.outcome
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_press(result.outcome.label(), result.outcome.role());
        }

        if result.outcome.changed() {
            // In-memory state stays authoritative when the write fails
            match self.storage.update_lfg_slots(message_id, session.slots()).await {
                Ok(true) => {}
                Ok(false) => warn!("Group {} has no stored row; slots not persisted", message_id),
                Err(e) => warn!("Failed to persist slots for group {}: {:#}", message_id, e),
            }
        }

        let view = self.render(&session).await;
        let announcement = if result.announce {
            if let Some(metrics) = &self.metrics {
                metrics.record_announcement();
            }
            info!("Group {} is full", message_id);
            Some(view.announcement())
        } else {
            None
        };

        Ok(PressReply {
            outcome: result.outcome,
            view,
            announcement,
        })
    }

    /// Close a session on behalf of `user`; only the leader may do this
    pub async fn close(&self, message_id: MessageId, user: UserId) -> Result<SessionView> {
        self.ensure_loaded(message_id).await?;

        let session = {
            let mut sessions = lock(&self.sessions);
            let session = sessions
                .get_mut(&message_id)
                .ok_or(KeymasterError::SessionNotFound { message_id })?;
            session.close(user)?;
            let closed = session.clone();
            sessions.remove(&message_id);
            lock(&self.closed).insert(message_id);
            closed
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_session_closed();
        }
        if let Err(e) = self.storage.delete_lfg(message_id).await {
            warn!("Failed to delete stored group {}: {:#}", message_id, e);
        }

        info!("Group {} closed by {}", message_id, user);
        Ok(self.render(&session).await)
    }

    /// Load every stored session into memory; returns how many were added
    pub async fn restore(&self) -> Result<usize> {
        let records = self.storage.get_active_lfgs().await?;
        let mut restored = 0;

        for record in &records {
            if lock(&self.closed).contains(&record.message_id) {
                debug!("Skipping stored group {}: closed", record.message_id);
                continue;
            }
            match LfgSession::from_record(record) {
                Ok(session) => {
                    let mut sessions = lock(&self.sessions);
                    if !sessions.contains_key(&record.message_id) {
                        sessions.insert(record.message_id, session);
                        restored += 1;
                    }
                }
                Err(e) => warn!("Skipping stored group {}: {:#}", record.message_id, e),
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.set_active_sessions(self.session_count());
        }
        info!("Restored {} of {} stored groups", restored, records.len());
        Ok(restored)
    }

    /// Make sure the session is in memory, hydrating it from storage if needed
    async fn ensure_loaded(&self, message_id: MessageId) -> Result<()> {
        if lock(&self.sessions).contains_key(&message_id) {
            return Ok(());
        }
        if lock(&self.closed).contains(&message_id) {
            return Err(KeymasterError::SessionNotFound { message_id }.into());
        }

        let record = self
            .storage
            .get_lfg(message_id)
            .await?
            .ok_or(KeymasterError::SessionNotFound { message_id })?;
        let session = LfgSession::from_record(&record)?;

        let mut sessions = lock(&self.sessions);
        // A close may have finished while the row was being read
        if lock(&self.closed).contains(&message_id) {
            return Err(KeymasterError::SessionNotFound { message_id }.into());
        }
        if !sessions.contains_key(&message_id) {
            debug!("Hydrated group {} from storage", message_id);
            sessions.insert(message_id, session);
            if let Some(metrics) = &self.metrics {
                metrics.record_session_opened();
            }
        }
        Ok(())
    }

    async fn render(&self, session: &LfgSession) -> SessionView {
        let mut stats = HashMap::new();
        for user in session.slots().members() {
            if let Some(found) = self.lookup_stats(user).await {
                stats.insert(user, found);
            }
        }
        SessionView::build(session, |user| stats.get(&user).copied())
    }

    /// Stats for a roster line: cache first, then the stored profile.
    ///
    /// A stored profile also schedules a background refresh so the next
    /// render finds the cache warm. A stored score of 0 means the character
    /// had no season score and is shown as absent.
    pub async fn lookup_stats(&self, user: UserId) -> Option<CharacterStats> {
        let cached = self.cache.get(&user);
        if let Some(metrics) = &self.metrics {
            metrics.record_cache_lookup(cached.is_some());
        }
        if cached.is_some() {
            return cached;
        }

        match self.storage.get_user(user).await {
            Ok(Some(record)) => {
                self.spawn_refresh(user, record.character());
                Some(record.stats()).filter(|stats| stats.score > 0.0)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to load profile of {} for roster: {:#}", user, e);
                None
            }
        }
    }

    fn spawn_refresh(&self, user: UserId, character: CharacterRef) {
        if !lock(&self.refreshing).insert(user) {
            return;
        }

        let ranking = self.ranking.clone();
        let cache = self.cache.clone();
        let refreshing = self.refreshing.clone();
        let metrics = self.metrics.clone();
        let timeout = self.refresh_timeout;

        let mut tasks = lock(&self.refreshes);
        // Reap finished refreshes so the set does not grow
        while tasks.try_join_next().is_some() {}

        tasks.spawn(async move {
            let fetch = ranking.fetch_character(&character.name, &character.realm, character.region);
            let outcome = match tokio::time::timeout(timeout, fetch).await {
                Ok(Ok(Some(profile))) => match profile.stats() {
                    Some(stats) => {
                        cache.set(user, stats);
                        "updated"
                    }
                    None => "no_score",
                },
                Ok(Ok(None)) => {
                    debug!("Refresh for {}: {} no longer exists", user, character);
                    "not_found"
                }
                Ok(Err(e)) => {
                    warn!("Refresh for {} ({}) failed: {:#}", user, character, e);
                    "failed"
                }
                Err(_) => {
                    debug!("Refresh for {} timed out after {:?}", user, timeout);
                    "timeout"
                }
            };

            if let Some(metrics) = &metrics {
                metrics.record_refresh(outcome);
            }
            lock(&refreshing).remove(&user);
        });
    }

    /// Wait for every in-flight background refresh to finish
    pub async fn drain_refreshes(&self) {
        let mut tasks = std::mem::take(&mut *lock(&self.refreshes));
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!("Background refresh task failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::{AffixSchedule, CharacterProfile, MockRankingProvider};
    use crate::storage::{MockStorage, SqliteStorage, UserRecord};
    use crate::types::Region;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Provider that answers only after `delay`
    struct SlowRanking {
        delay: Duration,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RankingProvider for SlowRanking {
        async fn fetch_character(&self, _: &str, _: &str, _: Region) -> Result<Option<CharacterProfile>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(Some(profile_json(3000.0)))
        }

        async fn fetch_weekly_affixes(&self, _: Region, _: &str) -> Result<Option<AffixSchedule>> {
            Ok(None)
        }
    }

    fn profile_json(score: f64) -> CharacterProfile {
        serde_json::from_value(serde_json::json!({
            "name": "Thrall",
            "class": "Shaman",
            "gear": { "item_level_equipped": 625.0 },
            "mythic_plus_scores_by_season": [ { "season": "current", "scores": { "all": score } } ]
        }))
        .unwrap()
    }

    fn stored_user(user_id: UserId, score: f64) -> UserRecord {
        UserRecord {
            user_id,
            character_name: "Thrall".to_string(),
            realm_slug: "gordunni".to_string(),
            region: Region::Eu,
            rio_score: score,
            character_class: Some("Shaman".to_string()),
            thumbnail_url: None,
            item_level: Some(610.0),
            last_updated: Utc::now(),
        }
    }

    fn listing() -> LfgListing {
        LfgListing::new("Halls of Atonement", 12, None)
    }

    fn idle_ranking() -> Arc<dyn RankingProvider> {
        let mut ranking = MockRankingProvider::new();
        ranking.expect_fetch_character().returning(|_, _, _| Ok(None));
        Arc::new(ranking)
    }

    async fn manager_with(ranking: Arc<dyn RankingProvider>) -> (LfgManager, Arc<SqliteStorage>, Arc<StatsCache>) {
        let storage = Arc::new(SqliteStorage::in_memory().await.unwrap());
        let cache = Arc::new(StatsCache::new(Duration::from_secs(300)));
        let manager = LfgManager::new(storage.clone(), cache.clone(), ranking, Duration::from_secs(8));
        (manager, storage, cache)
    }

    #[tokio::test]
    async fn test_press_persists_slots() {
        let (manager, storage, _) = manager_with(idle_ranking()).await;
        manager.open_session(500, 1, 99, listing()).await.unwrap();

        let reply = manager.press(500, 7, Role::Tank).await.unwrap();
        assert_eq!(
            reply.outcome,
            PressOutcome::Joined {
                role: Role::Tank,
                previous: None
            }
        );

        let stored = storage.get_lfg(500).await.unwrap().unwrap();
        assert_eq!(stored.slots.tank(), Some(7));
    }

    #[tokio::test]
    async fn test_fill_announces_once() {
        let (manager, _, _) = manager_with(idle_ranking()).await;
        manager.open_session(500, 1, 99, listing()).await.unwrap();

        let mut announcements = 0;
        for (user, role) in [(1, Role::Tank), (2, Role::Healer), (3, Role::Dps), (4, Role::Dps), (5, Role::Dps)] {
            if manager.press(500, user, role).await.unwrap().announcement.is_some() {
                announcements += 1;
            }
        }
        assert_eq!(announcements, 1);

        // Vacate and refill
        manager.press(500, 3, Role::Dps).await.unwrap();
        let reply = manager.press(500, 3, Role::Dps).await.unwrap();
        assert!(reply.announcement.is_some());
    }

    #[tokio::test]
    async fn test_slot_taken_leaves_state_alone() {
        let (manager, storage, _) = manager_with(idle_ranking()).await;
        manager.open_session(500, 1, 99, listing()).await.unwrap();
        manager.press(500, 1, Role::Healer).await.unwrap();

        let reply = manager.press(500, 2, Role::Healer).await.unwrap();
        assert_eq!(reply.outcome, PressOutcome::SlotTaken { role: Role::Healer });
        assert_eq!(storage.get_lfg(500).await.unwrap().unwrap().slots.healer(), Some(1));
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let (manager, _, _) = manager_with(idle_ranking()).await;
        let err = manager.press(404, 1, Role::Tank).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<KeymasterError>(),
            Some(KeymasterError::SessionNotFound { message_id: 404 })
        ));
    }

    #[tokio::test]
    async fn test_press_hydrates_from_storage() {
        let storage = Arc::new(SqliteStorage::in_memory().await.unwrap());
        let cache = Arc::new(StatsCache::new(Duration::from_secs(300)));

        let first = LfgManager::new(storage.clone(), cache.clone(), idle_ranking(), Duration::from_secs(8));
        first.open_session(500, 1, 99, listing()).await.unwrap();
        first.press(500, 7, Role::Dps).await.unwrap();

        // A fresh manager stands in for a restarted process
        let second = LfgManager::new(storage, cache, idle_ranking(), Duration::from_secs(8));
        assert_eq!(second.session_count(), 0);

        let reply = second.press(500, 8, Role::Dps).await.unwrap();
        assert_eq!(reply.view.dps.len(), 2);
        assert_eq!(second.session_count(), 1);
    }

    #[tokio::test]
    async fn test_close_requires_owner_and_deletes_row() {
        let (manager, storage, _) = manager_with(idle_ranking()).await;
        manager.open_session(500, 1, 99, listing()).await.unwrap();

        assert!(manager.close(500, 7).await.is_err());
        assert_eq!(manager.session_count(), 1);

        let view = manager.close(500, 99).await.unwrap();
        assert!(!view.buttons_enabled());
        assert_eq!(manager.session_count(), 0);
        assert!(storage.get_lfg(500).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_restore_loads_stored_sessions() {
        let storage = Arc::new(SqliteStorage::in_memory().await.unwrap());
        let cache = Arc::new(StatsCache::new(Duration::from_secs(300)));

        let first = LfgManager::new(storage.clone(), cache.clone(), idle_ranking(), Duration::from_secs(8));
        first.open_session(1, 1, 99, listing()).await.unwrap();
        first.open_session(2, 1, 99, listing()).await.unwrap();

        let second = LfgManager::new(storage, cache, idle_ranking(), Duration::from_secs(8));
        assert_eq!(second.restore().await.unwrap(), 2);
        assert_eq!(second.restore().await.unwrap(), 0);
        assert_eq!(second.session_count(), 2);
    }

    #[tokio::test]
    async fn test_stats_from_cache_first() {
        let mut ranking = MockRankingProvider::new();
        ranking.expect_fetch_character().never();
        let (manager, _, cache) = manager_with(Arc::new(ranking)).await;

        cache.set(
            7,
            CharacterStats {
                score: 2600.0,
                item_level: Some(630.0),
            },
        );
        manager.open_session(500, 1, 99, listing()).await.unwrap();
        let reply = manager.press(500, 7, Role::Tank).await.unwrap();

        let tank = reply.view.tank.unwrap();
        assert_eq!(tank.stats.map(|s| s.score), Some(2600.0));
    }

    #[tokio::test]
    async fn test_stored_profile_triggers_refresh() {
        let mut ranking = MockRankingProvider::new();
        ranking
            .expect_fetch_character()
            .times(1)
            .returning(|_, _, _| Ok(Some(profile_json(2750.0))));
        let (manager, storage, cache) = manager_with(Arc::new(ranking)).await;
        storage.upsert_user(&stored_user(7, 2500.0)).await.unwrap();

        manager.open_session(500, 1, 99, listing()).await.unwrap();
        let reply = manager.press(500, 7, Role::Tank).await.unwrap();

        // The first render uses the stored record
        assert_eq!(reply.view.tank.unwrap().stats.map(|s| s.score), Some(2500.0));

        manager.drain_refreshes().await;
        let cached = cache.get(&7).unwrap();
        assert_eq!(cached.score, 2750.0);
        assert_eq!(cached.item_level, Some(625.0));
    }

    #[tokio::test]
    async fn test_refresh_failure_is_ignored() {
        let mut ranking = MockRankingProvider::new();
        ranking.expect_fetch_character().returning(|_, _, _| {
            Err(KeymasterError::RankingUnavailable {
                attempts: 3,
                message: "status 503".to_string(),
            }
            .into())
        });
        let (manager, storage, cache) = manager_with(Arc::new(ranking)).await;
        storage.upsert_user(&stored_user(7, 2500.0)).await.unwrap();

        manager.open_session(500, 1, 99, listing()).await.unwrap();
        let reply = manager.press(500, 7, Role::Tank).await.unwrap();
        assert!(reply.view.tank.unwrap().stats.is_some());

        manager.drain_refreshes().await;
        assert!(cache.get(&7).is_none());
    }

    #[tokio::test]
    async fn test_persistence_failure_does_not_roll_back() {
        let mut storage = MockStorage::new();
        storage.expect_save_lfg().returning(|_| Ok(()));
        storage.expect_get_user().returning(|_| Ok(None));
        storage.expect_update_lfg_slots().returning(|_, _| {
            Err(KeymasterError::StorageError {
                message: "database is locked".to_string(),
            }
            .into())
        });

        let cache = Arc::new(StatsCache::new(Duration::from_secs(300)));
        let manager = LfgManager::new(Arc::new(storage), cache, idle_ranking(), Duration::from_secs(8));
        manager.open_session(500, 1, 99, listing()).await.unwrap();

        let reply = manager.press(500, 7, Role::Tank).await.unwrap();
        assert_eq!(reply.view.tank.map(|line| line.user_id), Some(7));
        assert_eq!(manager.session(500).unwrap().slots().tank(), Some(7));
    }

    #[tokio::test]
    async fn test_close_sticks_when_delete_fails() {
        let record = LfgSession::new(7, 1, 99, listing()).to_record().unwrap();
        let restored = record.clone();

        let mut storage = MockStorage::new();
        storage.expect_save_lfg().returning(|_| Ok(()));
        storage.expect_get_user().returning(|_| Ok(None));
        storage
            .expect_get_lfg()
            .returning(move |_| Ok(Some(record.clone())));
        storage
            .expect_get_active_lfgs()
            .returning(move || Ok(vec![restored.clone()]));
        storage
            .expect_delete_lfg()
            .returning(|_| Err(anyhow::anyhow!("disk I/O error")));
        storage.expect_update_lfg_slots().never();

        let cache = Arc::new(StatsCache::new(Duration::from_secs(300)));
        let manager = LfgManager::new(Arc::new(storage), cache, idle_ranking(), Duration::from_secs(8));
        manager.open_session(7, 1, 99, listing()).await.unwrap();

        let view = manager.close(7, 99).await.unwrap();
        assert!(!view.buttons_enabled());

        // The row is still stored, but the group must not come back
        let err = manager.press(7, 200, Role::Tank).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<KeymasterError>(),
            Some(KeymasterError::SessionNotFound { message_id: 7 })
        ));
        assert_eq!(manager.session_count(), 0);

        assert_eq!(manager.restore().await.unwrap(), 0);
        assert_eq!(manager.session_count(), 0);
        assert!(manager.close(7, 99).await.is_err());
    }

    #[tokio::test]
    async fn test_refresh_timeout_allows_retry() {
        let ranking = Arc::new(SlowRanking {
            delay: Duration::from_secs(5),
            calls: AtomicUsize::new(0),
        });
        let storage = Arc::new(SqliteStorage::in_memory().await.unwrap());
        storage.upsert_user(&stored_user(7, 2500.0)).await.unwrap();
        let cache = Arc::new(StatsCache::new(Duration::from_secs(300)));
        let manager = LfgManager::new(storage, cache.clone(), ranking.clone(), Duration::from_millis(50));

        let stats = manager.lookup_stats(7).await;
        assert_eq!(stats.map(|s| s.score), Some(2500.0));
        assert_eq!(lock(&manager.refreshing).len(), 1);

        // The refresh gives up well before the provider answers
        tokio::time::timeout(Duration::from_secs(2), manager.drain_refreshes())
            .await
            .expect("refresh should time out");
        assert!(cache.get(&7).is_none());
        assert!(lock(&manager.refreshing).is_empty());

        // No update means the next lookup tries again
        assert!(manager.lookup_stats(7).await.is_some());
        assert_eq!(lock(&manager.refreshing).len(), 1);
        manager.drain_refreshes().await;
        assert_eq!(ranking.calls.load(Ordering::SeqCst), 2);
        assert!(cache.get(&7).is_none());
    }

    #[tokio::test]
    async fn test_stored_zero_score_is_absent() {
        let mut ranking = MockRankingProvider::new();
        ranking.expect_fetch_character().returning(|_, _, _| Ok(None));
        let (manager, storage, _) = manager_with(Arc::new(ranking)).await;
        storage.upsert_user(&stored_user(7, 0.0)).await.unwrap();
        storage.upsert_user(&stored_user(8, 2400.0)).await.unwrap();

        manager.open_session(500, 1, 99, listing()).await.unwrap();
        manager.press(500, 7, Role::Tank).await.unwrap();
        let reply = manager.press(500, 8, Role::Healer).await.unwrap();

        assert!(reply.view.tank.unwrap().stats.is_none());
        assert_eq!(reply.view.healer.unwrap().stats.map(|s| s.score), Some(2400.0));
        manager.drain_refreshes().await;
    }
}
