//! Expiring caches
//!
//! The stats cache keeps recently fetched scores and item levels close at
//! hand so roster renders do not hit the ranking API for every button press.

pub mod ttl;

pub use ttl::{StatsCache, TtlCache};
