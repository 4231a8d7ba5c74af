//! Persistence layer
//!
//! Registered users and open group finder sessions live in a single SQLite
//! file. Everything above this module talks to the [`Storage`] trait.

pub mod models;
pub mod sqlite;

pub use models::{LfgRecord, UserRecord};
pub use sqlite::SqliteStorage;

use async_trait::async_trait;

use crate::error::Result;
use crate::lfg::RoleSlots;
use crate::types::{MessageId, UserId};

/// Durable storage for users and group finder sessions
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Storage: Send + Sync {
    /// Create tables that do not exist yet
    async fn create_tables(&self) -> Result<()>;

    /// Cheap round trip used by health checks
    async fn ping(&self) -> Result<()>;

    /// Insert or replace the user's registration
    async fn upsert_user(&self, user: &UserRecord) -> Result<()>;

    async fn get_user(&self, user_id: UserId) -> Result<Option<UserRecord>>;

    async fn get_all_users(&self) -> Result<Vec<UserRecord>>;

    /// Users ordered by score, highest first
    async fn get_top_users(&self, limit: u32) -> Result<Vec<UserRecord>>;

    async fn count_users(&self) -> Result<u64>;

    /// Insert or replace a session row
    async fn save_lfg(&self, record: &LfgRecord) -> Result<()>;

    /// Persist new slot occupants; false when no row exists for the message
    async fn update_lfg_slots(&self, message_id: MessageId, slots: &RoleSlots) -> Result<bool>;

    async fn get_lfg(&self, message_id: MessageId) -> Result<Option<LfgRecord>>;

    /// Every persisted session, oldest first
    async fn get_active_lfgs(&self) -> Result<Vec<LfgRecord>>;

    /// Remove a session row; false when it did not exist
    async fn delete_lfg(&self, message_id: MessageId) -> Result<bool>;
}
