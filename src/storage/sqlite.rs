//! SQLite-backed storage

use anyhow::Context;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::config::DatabaseSettings;
use crate::error::Result;
use crate::lfg::RoleSlots;
use crate::storage::models::{encode_dps, LfgRecord, LfgRow, UserRecord, UserRow};
use crate::storage::Storage;
use crate::types::{MessageId, UserId};

const CREATE_USERS: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    discord_id INTEGER PRIMARY KEY,
    character_name TEXT NOT NULL,
    realm_slug TEXT NOT NULL,
    region TEXT NOT NULL,
    rio_score REAL NOT NULL DEFAULT 0,
    character_class TEXT,
    thumbnail_url TEXT,
    item_level REAL,
    last_updated TEXT NOT NULL
)
"#;

const CREATE_LFG_MESSAGES: &str = r#"
CREATE TABLE IF NOT EXISTS lfg_messages (
    message_id INTEGER PRIMARY KEY,
    channel_id INTEGER NOT NULL,
    owner_id INTEGER NOT NULL,
    tank_id INTEGER,
    healer_id INTEGER,
    dps_ids TEXT NOT NULL DEFAULT '[]',
    snapshot TEXT NOT NULL,
    created_at TEXT NOT NULL
)
"#;

const USER_COLUMNS: &str = "discord_id, character_name, realm_slug, region, rio_score, character_class, thumbnail_url, item_level, last_updated";

const LFG_COLUMNS: &str =
    "message_id, channel_id, owner_id, tank_id, healer_id, dps_ids, snapshot, created_at";

/// Storage over a sqlx SQLite pool
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open (creating if needed) the database file named by the settings
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&settings.url)
            .with_context(|| format!("Invalid database URL {}", settings.url))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(settings.max_connections)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database {}", settings.url))?;

        info!("Connected to database {}", settings.url);
        Ok(Self { pool })
    }

    /// Private in-memory database; the single connection is kept alive so
    /// the data survives for the lifetime of the pool
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("Failed to open in-memory database")?;

        let storage = Self { pool };
        storage.create_tables().await?;
        Ok(storage)
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn create_tables(&self) -> Result<()> {
        sqlx::query(CREATE_USERS)
            .execute(&self.pool)
            .await
            .context("Failed to create users table")?;
        sqlx::query(CREATE_LFG_MESSAGES)
            .execute(&self.pool)
            .await
            .context("Failed to create lfg_messages table")?;
        debug!("Database tables ready");
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("Database ping failed")?;
        Ok(())
    }

    async fn upsert_user(&self, user: &UserRecord) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO users (discord_id, character_name, realm_slug, region, rio_score, character_class, thumbnail_url, item_level, last_updated)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(discord_id) DO UPDATE SET
                   character_name = excluded.character_name,
                   realm_slug = excluded.realm_slug,
                   region = excluded.region,
                   rio_score = excluded.rio_score,
                   character_class = excluded.character_class,
                   thumbnail_url = excluded.thumbnail_url,
                   item_level = excluded.item_level,
                   last_updated = excluded.last_updated"#,
        )
        .bind(user.user_id as i64)
        .bind(&user.character_name)
        .bind(&user.realm_slug)
        .bind(user.region.slug())
        .bind(user.rio_score)
        .bind(&user.character_class)
        .bind(&user.thumbnail_url)
        .bind(user.item_level)
        .bind(user.last_updated)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to save user {}", user.user_id))?;
        Ok(())
    }

    async fn get_user(&self, user_id: UserId) -> Result<Option<UserRecord>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {} FROM users WHERE discord_id = ?", USER_COLUMNS))
                .bind(user_id as i64)
                .fetch_optional(&self.pool)
                .await
                .with_context(|| format!("Failed to load user {}", user_id))?;

        row.map(UserRecord::try_from).transpose()
    }

    async fn get_all_users(&self) -> Result<Vec<UserRecord>> {
        let rows: Vec<UserRow> =
            sqlx::query_as(&format!("SELECT {} FROM users ORDER BY discord_id", USER_COLUMNS))
                .fetch_all(&self.pool)
                .await
                .context("Failed to load users")?;

        rows.into_iter().map(UserRecord::try_from).collect()
    }

    async fn get_top_users(&self, limit: u32) -> Result<Vec<UserRecord>> {
        let rows: Vec<UserRow> = sqlx::query_as(&format!(
            "SELECT {} FROM users ORDER BY rio_score DESC LIMIT ?",
            USER_COLUMNS
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load leaderboard")?;

        rows.into_iter().map(UserRecord::try_from).collect()
    }

    async fn count_users(&self) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count users")?;
        Ok(count as u64)
    }

    async fn save_lfg(&self, record: &LfgRecord) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO lfg_messages (message_id, channel_id, owner_id, tank_id, healer_id, dps_ids, snapshot, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(message_id) DO UPDATE SET
                   channel_id = excluded.channel_id,
                   owner_id = excluded.owner_id,
                   tank_id = excluded.tank_id,
                   healer_id = excluded.healer_id,
                   dps_ids = excluded.dps_ids,
                   snapshot = excluded.snapshot"#,
        )
        .bind(record.message_id as i64)
        .bind(record.channel_id as i64)
        .bind(record.owner_id as i64)
        .bind(record.slots.tank().map(|id| id as i64))
        .bind(record.slots.healer().map(|id| id as i64))
        .bind(encode_dps(&record.slots))
        .bind(&record.snapshot)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to save group {}", record.message_id))?;
        Ok(())
    }

    async fn update_lfg_slots(&self, message_id: MessageId, slots: &RoleSlots) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE lfg_messages SET tank_id = ?, healer_id = ?, dps_ids = ? WHERE message_id = ?",
        )
        .bind(slots.tank().map(|id| id as i64))
        .bind(slots.healer().map(|id| id as i64))
        .bind(encode_dps(slots))
        .bind(message_id as i64)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to update slots of group {}", message_id))?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_lfg(&self, message_id: MessageId) -> Result<Option<LfgRecord>> {
        let row: Option<LfgRow> = sqlx::query_as(&format!(
            "SELECT {} FROM lfg_messages WHERE message_id = ?",
            LFG_COLUMNS
        ))
        .bind(message_id as i64)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Failed to load group {}", message_id))?;

        row.map(LfgRecord::try_from).transpose()
    }

    async fn get_active_lfgs(&self) -> Result<Vec<LfgRecord>> {
        let rows: Vec<LfgRow> = sqlx::query_as(&format!(
            "SELECT {} FROM lfg_messages ORDER BY created_at",
            LFG_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to load groups")?;

        // One corrupt row must not hide the other groups
        Ok(rows
            .into_iter()
            .filter_map(|row| match LfgRecord::try_from(row) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Skipping unreadable group row: {:#}", e);
                    None
                }
            })
            .collect())
    }

    async fn delete_lfg(&self, message_id: MessageId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM lfg_messages WHERE message_id = ?")
            .bind(message_id as i64)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to delete group {}", message_id))?;
        Ok(result.rows_affected() > 0)
    }
}
