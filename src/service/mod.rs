//! Service layer for the KeyMaster bot
//!
//! This module contains the main application state, the character profile
//! workflows behind the slash commands, and health reporting.

pub mod app;
pub mod health;
pub mod profile;

pub use app::{AppState, ServiceError};
pub use health::{HealthCheck, HealthStatus};
pub use profile::{
    ProfileLookup, ProfileService, RefreshSummary, RegisterOutcome, UpdateOutcome,
};
