//! Character registration and profile lookups
//!
//! Every path that fetches a fresh profile for a known user writes the
//! result through to storage and the stats cache.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cache::StatsCache;
use crate::error::Result;
use crate::ranking::{AffixSchedule, CharacterProfile, RankingProvider};
use crate::storage::{Storage, UserRecord};
use crate::types::{CharacterRef, Region, UserId};

/// Result of `/register`
#[derive(Debug, Clone, PartialEq)]
pub enum RegisterOutcome {
    Registered(UserRecord),
    CharacterNotFound,
}

/// Result of `/update`
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    NotRegistered,
    CharacterNotFound(CharacterRef),
    Updated {
        previous: UserRecord,
        current: UserRecord,
    },
}

impl UpdateOutcome {
    /// Whether the score went up since the last stored value
    pub fn improved(&self) -> bool {
        match self {
            UpdateOutcome::Updated { previous, current } => current.rio_score > previous.rio_score,
            _ => false,
        }
    }
}

/// Result of looking up a character for display
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileLookup {
    NotRegistered,
    CharacterNotFound(CharacterRef),
    Found {
        character: CharacterRef,
        profile: Box<CharacterProfile>,
    },
}

/// Totals from one pass of the periodic refresh
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub updated: usize,
    pub missing: usize,
    pub failed: usize,
}

pub struct ProfileService {
    storage: Arc<dyn Storage>,
    cache: Arc<StatsCache>,
    ranking: Arc<dyn RankingProvider>,
    affix_locale: String,
}

impl ProfileService {
    pub fn new(
        storage: Arc<dyn Storage>,
        cache: Arc<StatsCache>,
        ranking: Arc<dyn RankingProvider>,
    ) -> Self {
        Self {
            storage,
            cache,
            ranking,
            affix_locale: "en".to_string(),
        }
    }

    pub fn with_affix_locale(mut self, locale: impl Into<String>) -> Self {
        self.affix_locale = locale.into();
        self
    }

    /// Verify the character exists, then store it as the user's registration
    pub async fn register(&self, user: UserId, character: CharacterRef) -> Result<RegisterOutcome> {
        let profile = match self
            .ranking
            .fetch_character(&character.name, &character.realm, character.region)
            .await?
        {
            Some(profile) => profile,
            None => {
                debug!("Registration of {} by {}: character not found", character, user);
                return Ok(RegisterOutcome::CharacterNotFound);
            }
        };

        let record = UserRecord::from_profile(user, &character, &profile);
        self.storage.upsert_user(&record).await?;
        self.cache.set(user, record.stats());

        info!(
            "User {} registered {} with score {}",
            user, character, record.rio_score
        );
        Ok(RegisterOutcome::Registered(record))
    }

    /// Re-fetch the user's registered character and store the new values
    pub async fn update(&self, user: UserId) -> Result<UpdateOutcome> {
        let previous = match self.storage.get_user(user).await? {
            Some(record) => record,
            None => return Ok(UpdateOutcome::NotRegistered),
        };
        let character = previous.character();

        let profile = match self
            .ranking
            .fetch_character(&character.name, &character.realm, character.region)
            .await?
        {
            Some(profile) => profile,
            None => return Ok(UpdateOutcome::CharacterNotFound(character)),
        };

        let current = UserRecord::from_profile(user, &character, &profile);
        self.storage.upsert_user(&current).await?;
        self.cache.set(user, current.stats());

        info!(
            "User {} updated {}: {} -> {}",
            user, character, previous.rio_score, current.rio_score
        );
        Ok(UpdateOutcome::Updated { previous, current })
    }

    /// Current profile of the user's registered character
    pub async fn my_profile(&self, user: UserId) -> Result<ProfileLookup> {
        match self.storage.get_user(user).await? {
            Some(record) => self.lookup(Some(user), record.character()).await,
            None => Ok(ProfileLookup::NotRegistered),
        }
    }

    /// Profile of an arbitrary character
    pub async fn check(&self, character: CharacterRef) -> Result<ProfileLookup> {
        self.lookup(None, character).await
    }

    /// Weekly runs for an explicit character, or the caller's own one
    pub async fn weekly(&self, user: UserId, character: Option<CharacterRef>) -> Result<ProfileLookup> {
        match character {
            Some(character) => self.check(character).await,
            None => self.my_profile(user).await,
        }
    }

    pub async fn leaderboard(&self, limit: u32) -> Result<Vec<UserRecord>> {
        self.storage.get_top_users(limit).await
    }

    pub async fn affixes(&self, region: Region) -> Result<Option<AffixSchedule>> {
        self.ranking
            .fetch_weekly_affixes(region, &self.affix_locale)
            .await
    }

    async fn lookup(&self, owner: Option<UserId>, character: CharacterRef) -> Result<ProfileLookup> {
        match self
            .ranking
            .fetch_character(&character.name, &character.realm, character.region)
            .await?
        {
            Some(profile) => {
                if let (Some(user), Some(stats)) = (owner, profile.stats()) {
                    self.cache.set(user, stats);
                }
                Ok(ProfileLookup::Found {
                    character,
                    profile: Box::new(profile),
                })
            }
            None => Ok(ProfileLookup::CharacterNotFound(character)),
        }
    }

    /// Refresh every registered character, pausing between API calls.
    ///
    /// Individual failures are logged and skipped; only failing to list the
    /// users aborts the pass.
    pub async fn refresh_all(&self, pause: Duration) -> Result<RefreshSummary> {
        let users = self.storage.get_all_users().await?;
        info!("Refreshing {} registered characters", users.len());

        let mut summary = RefreshSummary::default();
        for (index, user) in users.iter().enumerate() {
            if index > 0 && !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }

            let character = user.character();
            match self
                .ranking
                .fetch_character(&character.name, &character.realm, character.region)
                .await
            {
                Ok(Some(profile)) => {
                    let record = UserRecord::from_profile(user.user_id, &character, &profile);
                    if let Err(e) = self.storage.upsert_user(&record).await {
                        warn!("Failed to store refreshed {}: {:#}", character, e);
                        summary.failed += 1;
                        continue;
                    }
                    self.cache.set(user.user_id, record.stats());
                    summary.updated += 1;
                }
                Ok(None) => {
                    warn!("Refresh skipped {}: character not found", character);
                    summary.missing += 1;
                }
                Err(e) => {
                    warn!("Refresh of {} failed: {:#}", character, e);
                    summary.failed += 1;
                }
            }
        }

        info!(
            "Profile refresh finished: {} updated, {} missing, {} failed",
            summary.updated, summary.missing, summary.failed
        );
        Ok(summary)
    }
}
