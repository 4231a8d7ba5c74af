//! Common types used throughout the bot

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::KeymasterError;

/// Discord user snowflake
pub type UserId = u64;

/// Discord message snowflake, also the identity of a group finder session
pub type MessageId = u64;

/// Discord channel snowflake
pub type ChannelId = u64;

/// Raider.IO region a character lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Eu,
    Us,
    Kr,
    Tw,
    Cn,
}

impl Region {
    pub const ALL: [Region; 5] = [Region::Eu, Region::Us, Region::Kr, Region::Tw, Region::Cn];

    /// Slug used by the Raider.IO API and stored in the database
    pub fn slug(&self) -> &'static str {
        match self {
            Region::Eu => "eu",
            Region::Us => "us",
            Region::Kr => "kr",
            Region::Tw => "tw",
            Region::Cn => "cn",
        }
    }

    /// Label shown in command choices
    pub fn label(&self) -> &'static str {
        match self {
            Region::Eu => "EU",
            Region::Us => "US",
            Region::Kr => "KR",
            Region::Tw => "TW",
            Region::Cn => "CN",
        }
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for Region {
    type Err = KeymasterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "eu" => Ok(Region::Eu),
            "us" => Ok(Region::Us),
            "kr" => Ok(Region::Kr),
            "tw" => Ok(Region::Tw),
            "cn" => Ok(Region::Cn),
            other => Err(KeymasterError::InvalidInput {
                reason: format!("unknown region '{}'", other),
            }),
        }
    }
}

/// Role categories a group finder session hands out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Tank,
    Healer,
    Dps,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Tank, Role::Healer, Role::Dps];

    /// Maximum number of occupants for this role
    pub fn capacity(&self) -> usize {
        match self {
            Role::Tank | Role::Healer => 1,
            Role::Dps => 3,
        }
    }

    /// Stable identifier used in button custom ids
    pub fn slug(&self) -> &'static str {
        match self {
            Role::Tank => "tank",
            Role::Healer => "healer",
            Role::Dps => "dps",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::Tank => "Tank",
            Role::Healer => "Healer",
            Role::Dps => "DPS",
        }
    }

    pub fn icon(&self) -> char {
        match self {
            Role::Tank => '🛡',
            Role::Healer => '💚',
            Role::Dps => '⚔',
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for Role {
    type Err = KeymasterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tank" => Ok(Role::Tank),
            "healer" => Ok(Role::Healer),
            "dps" => Ok(Role::Dps),
            other => Err(KeymasterError::InvalidInput {
                reason: format!("unknown role '{}'", other),
            }),
        }
    }
}

/// Score and item level pair kept in the stats cache
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CharacterStats {
    pub score: f64,
    pub item_level: Option<f64>,
}

/// A character addressed by name, realm slug and region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterRef {
    pub name: String,
    pub realm: String,
    pub region: Region,
}

impl CharacterRef {
    pub fn new(name: impl Into<String>, realm: impl Into<String>, region: Region) -> Self {
        Self {
            name: name.into(),
            realm: realm.into(),
            region,
        }
    }
}

impl std::fmt::Display for CharacterRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}, {})", self.name, self.realm, self.region)
    }
}
