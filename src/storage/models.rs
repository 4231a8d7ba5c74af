//! Records persisted in SQLite

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::error::{KeymasterError, Result};
use crate::lfg::RoleSlots;
use crate::ranking::CharacterProfile;
use crate::types::{CharacterRef, CharacterStats, ChannelId, MessageId, Region, UserId};

/// A registered user and the last known state of their character
#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub user_id: UserId,
    pub character_name: String,
    pub realm_slug: String,
    pub region: Region,
    pub rio_score: f64,
    pub character_class: Option<String>,
    pub thumbnail_url: Option<String>,
    pub item_level: Option<f64>,
    pub last_updated: DateTime<Utc>,
}

impl UserRecord {
    /// Build a record from a fresh profile; a missing score is stored as 0
    pub fn from_profile(user_id: UserId, character: &CharacterRef, profile: &CharacterProfile) -> Self {
        Self {
            user_id,
            character_name: character.name.clone(),
            realm_slug: character.realm.clone(),
            region: character.region,
            rio_score: profile.current_score().unwrap_or(0.0),
            character_class: profile.class.clone(),
            thumbnail_url: profile.thumbnail_url.clone(),
            item_level: profile.item_level(),
            last_updated: Utc::now(),
        }
    }

    pub fn character(&self) -> CharacterRef {
        CharacterRef::new(self.character_name.clone(), self.realm_slug.clone(), self.region)
    }

    pub fn stats(&self) -> CharacterStats {
        CharacterStats {
            score: self.rio_score,
            item_level: self.item_level,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct UserRow {
    pub(crate) discord_id: i64,
    pub(crate) character_name: String,
    pub(crate) realm_slug: String,
    pub(crate) region: String,
    pub(crate) rio_score: f64,
    pub(crate) character_class: Option<String>,
    pub(crate) thumbnail_url: Option<String>,
    pub(crate) item_level: Option<f64>,
    pub(crate) last_updated: DateTime<Utc>,
}

impl TryFrom<UserRow> for UserRecord {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(Self {
            user_id: row.discord_id as UserId,
            character_name: row.character_name,
            realm_slug: row.realm_slug,
            region: row.region.parse()?,
            rio_score: row.rio_score,
            character_class: row.character_class,
            thumbnail_url: row.thumbnail_url,
            item_level: row.item_level,
            last_updated: row.last_updated,
        })
    }
}

/// Durable state of a group finder session
#[derive(Debug, Clone, PartialEq)]
pub struct LfgRecord {
    pub message_id: MessageId,
    pub channel_id: ChannelId,
    pub owner_id: UserId,
    pub slots: RoleSlots,
    /// JSON rendering snapshot used to rebuild the listing after a restart
    pub snapshot: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub(crate) struct LfgRow {
    pub(crate) message_id: i64,
    pub(crate) channel_id: i64,
    pub(crate) owner_id: i64,
    pub(crate) tank_id: Option<i64>,
    pub(crate) healer_id: Option<i64>,
    pub(crate) dps_ids: String,
    pub(crate) snapshot: String,
    pub(crate) created_at: DateTime<Utc>,
}

impl TryFrom<LfgRow> for LfgRecord {
    type Error = anyhow::Error;

    fn try_from(row: LfgRow) -> Result<Self> {
        let dps: Vec<i64> =
            serde_json::from_str(&row.dps_ids).map_err(|e| KeymasterError::StorageError {
                message: format!("bad dps_ids for message {}: {}", row.message_id, e),
            })?;

        Ok(Self {
            message_id: row.message_id as MessageId,
            channel_id: row.channel_id as ChannelId,
            owner_id: row.owner_id as UserId,
            slots: RoleSlots::from_parts(
                row.tank_id.map(|id| id as UserId),
                row.healer_id.map(|id| id as UserId),
                dps.into_iter().map(|id| id as UserId).collect(),
            ),
            snapshot: row.snapshot,
            created_at: row.created_at,
        })
    }
}

/// Encode the dps occupants for the `dps_ids` column
pub(crate) fn encode_dps(slots: &RoleSlots) -> String {
    let ids: Vec<i64> = slots.dps().iter().map(|id| *id as i64).collect();
    // Serializing a Vec<i64> cannot fail
    serde_json::to_string(&ids).unwrap_or_else(|_| "[]".to_string())
}
