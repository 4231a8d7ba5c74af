//! Raider.IO integration
//!
//! Profile and affix lookups go through [`RankingClient`], which bounds
//! concurrency and retries transient failures. Callers depend on the
//! [`RankingProvider`] trait so tests can substitute scripted data.

pub mod client;
pub mod models;
pub mod retry;
pub mod transport;

pub use client::{RankingClient, RankingProvider, PROFILE_FIELDS};
pub use models::{AffixDetail, AffixSchedule, CharacterProfile, DungeonRun, Gear, GuildInfo};
pub use retry::{classify_status, RetryPolicy, StatusClass};
pub use transport::{HttpResponse, HttpTransport, ReqwestTransport};

#[cfg(test)]
pub use client::MockRankingProvider;
