//! Raider.IO response payloads

use serde::{Deserialize, Serialize};

use crate::types::CharacterStats;

/// Character profile as returned by `/characters/profile`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterProfile {
    pub name: String,
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub active_spec_name: Option<String>,
    #[serde(default)]
    pub race: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub realm: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub profile_url: Option<String>,
    #[serde(default)]
    pub gear: Option<Gear>,
    #[serde(default)]
    pub guild: Option<GuildInfo>,
    #[serde(default)]
    pub mythic_plus_scores_by_season: Vec<SeasonScores>,
    #[serde(default)]
    pub mythic_plus_best_runs: Vec<DungeonRun>,
    #[serde(default)]
    pub mythic_plus_weekly_highest_level_runs: Vec<DungeonRun>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gear {
    #[serde(default)]
    pub item_level_equipped: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildInfo {
    pub name: String,
    #[serde(default)]
    pub realm: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonScores {
    pub season: String,
    pub scores: Scores,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    #[serde(default)]
    pub all: Option<f64>,
}

/// A timed or depleted keystone run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DungeonRun {
    pub dungeon: String,
    #[serde(default)]
    pub short_name: Option<String>,
    pub mythic_level: u32,
    #[serde(default)]
    pub num_keystone_upgrades: u32,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl DungeonRun {
    /// One star per keystone upgrade, or "depleted" for an untimed run
    pub fn upgrade_stars(&self) -> String {
        if self.num_keystone_upgrades == 0 {
            "depleted".to_string()
        } else {
            "⭐".repeat(self.num_keystone_upgrades as usize)
        }
    }
}

impl CharacterProfile {
    /// Overall score for the current season, if the API reported one
    pub fn current_score(&self) -> Option<f64> {
        self.mythic_plus_scores_by_season
            .first()
            .and_then(|season| season.scores.all)
    }

    pub fn item_level(&self) -> Option<f64> {
        self.gear.as_ref().and_then(|gear| gear.item_level_equipped)
    }

    pub fn guild_name(&self) -> Option<&str> {
        self.guild.as_ref().map(|guild| guild.name.as_str())
    }

    /// Best runs ordered by score, highest first
    pub fn top_runs(&self, limit: usize) -> Vec<&DungeonRun> {
        let mut runs: Vec<&DungeonRun> = self.mythic_plus_best_runs.iter().collect();
        runs.sort_by(|a, b| b.score.total_cmp(&a.score));
        runs.truncate(limit);
        runs
    }

    /// Highest weekly runs, as many as the great vault tracks
    pub fn weekly_runs(&self, limit: usize) -> &[DungeonRun] {
        let runs = &self.mythic_plus_weekly_highest_level_runs;
        &runs[..runs.len().min(limit)]
    }

    /// Stats worth caching; absent when the profile carries no score
    pub fn stats(&self) -> Option<CharacterStats> {
        self.current_score().map(|score| CharacterStats {
            score,
            item_level: self.item_level(),
        })
    }
}

/// Weekly affix rotation from `/mythic-plus/affixes`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffixSchedule {
    #[serde(default)]
    pub region: Option<String>,
    pub title: String,
    #[serde(default)]
    pub leaderboard_url: Option<String>,
    #[serde(default)]
    pub affix_details: Vec<AffixDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffixDetail {
    #[serde(default)]
    pub id: Option<u32>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub wowhead_url: Option<String>,
}
