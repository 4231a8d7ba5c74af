//! Test fixtures shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use keymaster::config::RankingSettings;
use keymaster::error::Result;
use keymaster::ranking::{
    AffixSchedule, CharacterProfile, HttpResponse, HttpTransport, RankingProvider,
};
use keymaster::types::Region;
use keymaster::{KeymasterError, SqliteStorage};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Raider.IO profile JSON for a character with the given score and item level
pub fn profile_json(name: &str, class: &str, score: f64, item_level: f64) -> String {
    serde_json::json!({
        "name": name,
        "race": "Orc",
        "class": class,
        "active_spec_name": "Enhancement",
        "region": "eu",
        "realm": "Gordunni",
        "thumbnail_url": format!("https://render.worldofwarcraft.com/eu/character/{}.jpg", name.to_lowercase()),
        "profile_url": format!("https://raider.io/characters/eu/gordunni/{}", name),
        "gear": { "item_level_equipped": item_level },
        "guild": { "name": "Horde Vanguard", "realm": "Gordunni" },
        "mythic_plus_scores_by_season": [
            { "season": "season-tww-3", "scores": { "all": score } }
        ],
        "mythic_plus_best_runs": [
            {
                "dungeon": "Halls of Atonement",
                "short_name": "HOA",
                "mythic_level": 14,
                "num_keystone_upgrades": 2,
                "score": 410.5
            }
        ],
        "mythic_plus_weekly_highest_level_runs": []
    })
    .to_string()
}

pub fn profile(name: &str, class: &str, score: f64, item_level: f64) -> CharacterProfile {
    serde_json::from_str(&profile_json(name, class, score, item_level))
        .expect("fixture profile must parse")
}

/// Ranking provider answering from a fixed table of characters
#[derive(Default)]
pub struct ScriptedRanking {
    characters: Mutex<HashMap<(String, String, Region), CharacterProfile>>,
    unavailable: Mutex<bool>,
    calls: AtomicUsize,
}

impl ScriptedRanking {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_character(self: Arc<Self>, realm: &str, region: Region, profile: CharacterProfile) -> Arc<Self> {
        self.add_character(realm, region, profile);
        self
    }

    pub fn add_character(&self, realm: &str, region: Region, profile: CharacterProfile) {
        let key = (profile.name.to_lowercase(), realm.to_string(), region);
        self.characters.lock().unwrap().insert(key, profile);
    }

    /// Make every following call fail as if the API were down
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().unwrap() = unavailable;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RankingProvider for ScriptedRanking {
    async fn fetch_character(
        &self,
        name: &str,
        realm: &str,
        region: Region,
    ) -> Result<Option<CharacterProfile>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *self.unavailable.lock().unwrap() {
            return Err(KeymasterError::RankingUnavailable {
                attempts: 3,
                message: "HTTP 503".to_string(),
            }
            .into());
        }

        let key = (name.to_lowercase(), realm.to_string(), region);
        Ok(self.characters.lock().unwrap().get(&key).cloned())
    }

    async fn fetch_weekly_affixes(
        &self,
        region: Region,
        _locale: &str,
    ) -> Result<Option<AffixSchedule>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(AffixSchedule {
            region: Some(region.slug().to_string()),
            title: "Tyrannical, Xal'atath's Bargain: Ascendant".to_string(),
            leaderboard_url: None,
            affix_details: Vec::new(),
        }))
    }
}

/// HTTP transport that replays a fixed list of responses
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<HttpResponse>>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<HttpResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<HttpResponse> {
        let query = query
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<_>>()
            .join("&");
        self.requests.lock().unwrap().push(format!("{}?{}", url, query));

        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| HttpResponse::new(500, "script exhausted")))
    }
}

/// Ranking settings with a short backoff so retries stay fast
pub fn fast_ranking_settings() -> RankingSettings {
    RankingSettings {
        backoff_base_ms: 20,
        backoff_max_ms: 100,
        ..RankingSettings::default()
    }
}

pub async fn memory_storage() -> Arc<SqliteStorage> {
    Arc::new(
        SqliteStorage::in_memory()
            .await
            .expect("in-memory database must open"),
    )
}

/// Refresh timeout used by group finder managers in tests
pub const REFRESH_TIMEOUT: Duration = Duration::from_secs(2);
