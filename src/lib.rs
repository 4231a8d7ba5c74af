//! KeyMaster - guild coordination bot for Raider.IO profiles and group finding
//!
//! This crate provides character registration backed by the Raider.IO API,
//! an expiring stats cache, and interactive role-slot group finder sessions
//! that survive restarts through SQLite.

pub mod cache;
pub mod config;
pub mod discord;
pub mod error;
pub mod lfg;
pub mod metrics;
pub mod ranking;
pub mod service;
pub mod storage;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{KeymasterError, Result};
pub use types::*;

// Re-export key components
pub use cache::{StatsCache, TtlCache};
pub use lfg::{LfgManager, LfgSession};
pub use ranking::{RankingClient, RankingProvider};
pub use storage::{SqliteStorage, Storage};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
