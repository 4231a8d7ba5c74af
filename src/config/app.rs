//! Main application configuration
//!
//! This module defines the configuration structures for the bot, including
//! environment variable loading, optional TOML files and validation.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

use crate::error::KeymasterError;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub discord: DiscordSettings,
    pub database: DatabaseSettings,
    pub ranking: RankingSettings,
    pub cache: CacheSettings,
    pub lfg: LfgSettings,
    pub refresh: RefreshSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Port for health check endpoint, 0 disables the server
    pub health_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Discord connection settings
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordSettings {
    /// Bot token, normally supplied through DISCORD_TOKEN
    pub token: String,
    /// Register commands in this guild only (instant updates while developing)
    pub guild_id: Option<u64>,
}

impl std::fmt::Debug for DiscordSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordSettings")
            .field("token", &if self.token.is_empty() { "<unset>" } else { "<redacted>" })
            .field("guild_id", &self.guild_id)
            .finish()
    }
}

/// SQLite settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// sqlx connection URL
    pub url: String,
    pub max_connections: u32,
}

/// Raider.IO client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingSettings {
    pub base_url: String,
    /// Process-wide limit of in-flight API calls
    pub max_concurrent_requests: usize,
    /// Total attempts per call, including the first one
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    /// Upper bound of the random jitter as a fraction of the backoff
    pub jitter_ratio: f64,
    pub request_timeout_seconds: u64,
    /// Locale requested for the affix schedule
    pub affix_locale: String,
}

/// Stats cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub default_ttl_seconds: u64,
    pub max_entries: usize,
    /// How often expired entries are swept
    pub sweep_interval_seconds: u64,
}

/// Group finder settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LfgSettings {
    /// Timeout for the background stats refresh triggered by a roster render
    pub refresh_timeout_seconds: u64,
}

/// Periodic profile refresh settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshSettings {
    pub enabled: bool,
    pub interval_seconds: u64,
    /// Pause between characters so the API is not hammered
    pub pause_between_ms: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "keymaster".to_string(),
            log_level: "info".to_string(),
            health_port: 8080,
            shutdown_timeout_seconds: 10,
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "sqlite://bot_database.db?mode=rwc".to_string(),
            max_connections: 5,
        }
    }
}

impl Default for RankingSettings {
    fn default() -> Self {
        Self {
            base_url: "https://raider.io/api/v1".to_string(),
            max_concurrent_requests: 5,
            max_attempts: 3,
            backoff_base_ms: 800,
            backoff_max_ms: 8000,
            jitter_ratio: 0.2,
            request_timeout_seconds: 15,
            affix_locale: "en".to_string(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            default_ttl_seconds: 300, // 5 minutes
            max_entries: 10_000,
            sweep_interval_seconds: 60,
        }
    }
}

impl Default for LfgSettings {
    fn default() -> Self {
        Self {
            refresh_timeout_seconds: 8,
        }
    }
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: 3600, // 1 hour
            pause_between_ms: 2000,
        }
    }
}

/// Parse an override value, naming the variable in the error
fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| {
            KeymasterError::ConfigurationError {
                message: format!("Invalid {} value: {}", key, value),
            }
            .into()
        })
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_overrides(|key| env::var(key).ok())?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load a TOML file, then let environment variables override it
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config = Self::from_toml_str(&raw)?;
        config.apply_overrides(|key| env::var(key).ok())?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Parse a TOML document; missing sections fall back to defaults
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("Failed to parse TOML configuration")
    }

    /// Apply overrides from a key lookup (the process environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Service settings
        if let Some(name) = lookup("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Some(log_level) = lookup("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Some(port) = lookup("HEALTH_PORT") {
            self.service.health_port = parse_var("HEALTH_PORT", &port)?;
        }
        if let Some(timeout) = lookup("SHUTDOWN_TIMEOUT_SECONDS") {
            self.service.shutdown_timeout_seconds = parse_var("SHUTDOWN_TIMEOUT_SECONDS", &timeout)?;
        }

        // Discord settings
        if let Some(token) = lookup("DISCORD_TOKEN") {
            self.discord.token = token;
        }
        if let Some(guild_id) = lookup("DISCORD_GUILD_ID") {
            self.discord.guild_id = Some(parse_var("DISCORD_GUILD_ID", &guild_id)?);
        }

        // Database settings
        if let Some(url) = lookup("DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(max) = lookup("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_var("DATABASE_MAX_CONNECTIONS", &max)?;
        }

        // Ranking API settings
        if let Some(url) = lookup("RAIDERIO_BASE_URL") {
            self.ranking.base_url = url;
        }
        if let Some(max) = lookup("RAIDERIO_MAX_CONCURRENT_REQUESTS") {
            self.ranking.max_concurrent_requests =
                parse_var("RAIDERIO_MAX_CONCURRENT_REQUESTS", &max)?;
        }
        if let Some(attempts) = lookup("RAIDERIO_MAX_ATTEMPTS") {
            self.ranking.max_attempts = parse_var("RAIDERIO_MAX_ATTEMPTS", &attempts)?;
        }
        if let Some(timeout) = lookup("RAIDERIO_REQUEST_TIMEOUT_SECONDS") {
            self.ranking.request_timeout_seconds =
                parse_var("RAIDERIO_REQUEST_TIMEOUT_SECONDS", &timeout)?;
        }
        if let Some(locale) = lookup("RAIDERIO_AFFIX_LOCALE") {
            self.ranking.affix_locale = locale;
        }

        // Cache settings
        if let Some(ttl) = lookup("CACHE_TTL_SECONDS") {
            self.cache.default_ttl_seconds = parse_var("CACHE_TTL_SECONDS", &ttl)?;
        }
        if let Some(max) = lookup("CACHE_MAX_ENTRIES") {
            self.cache.max_entries = parse_var("CACHE_MAX_ENTRIES", &max)?;
        }

        // Group finder and refresh settings
        if let Some(timeout) = lookup("LFG_REFRESH_TIMEOUT_SECONDS") {
            self.lfg.refresh_timeout_seconds = parse_var("LFG_REFRESH_TIMEOUT_SECONDS", &timeout)?;
        }
        if let Some(enabled) = lookup("PROFILE_REFRESH_ENABLED") {
            self.refresh.enabled = parse_var("PROFILE_REFRESH_ENABLED", &enabled)?;
        }
        if let Some(interval) = lookup("PROFILE_REFRESH_INTERVAL_SECONDS") {
            self.refresh.interval_seconds = parse_var("PROFILE_REFRESH_INTERVAL_SECONDS", &interval)?;
        }

        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get the default cache TTL as Duration
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.default_ttl_seconds)
    }

    /// Get the cache sweep interval as Duration
    pub fn cache_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.cache.sweep_interval_seconds)
    }

    /// Get the roster refresh timeout as Duration
    pub fn lfg_refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.lfg.refresh_timeout_seconds)
    }

    /// Get the profile refresh interval as Duration
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh.interval_seconds)
    }

    /// Get the pause between refreshed characters as Duration
    pub fn refresh_pause(&self) -> Duration {
        Duration::from_millis(self.refresh.pause_between_ms)
    }
}

/// Validate configuration values; failures are `KeymasterError::ConfigurationError`
pub fn validate_config(config: &AppConfig) -> Result<()> {
    check_values(config).map_err(|e| {
        KeymasterError::ConfigurationError {
            message: e.to_string(),
        }
        .into()
    })
}

fn check_values(config: &AppConfig) -> Result<()> {
    // The token is the one setting without a usable default
    if config.discord.token.trim().is_empty() {
        return Err(anyhow!(
            "DISCORD_TOKEN is not set; put it in the environment or a .env file"
        ));
    }

    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    // Validate database settings
    if config.database.url.is_empty() {
        return Err(anyhow!("Database URL cannot be empty"));
    }
    if config.database.max_connections == 0 {
        return Err(anyhow!("Database max connections must be greater than 0"));
    }

    // Validate ranking settings
    if config.ranking.base_url.is_empty() {
        return Err(anyhow!("Ranking API base URL cannot be empty"));
    }
    if config.ranking.max_concurrent_requests == 0 {
        return Err(anyhow!("Ranking API concurrency must be greater than 0"));
    }
    if config.ranking.max_attempts == 0 {
        return Err(anyhow!("Ranking API attempts must be greater than 0"));
    }
    if config.ranking.backoff_max_ms < config.ranking.backoff_base_ms {
        return Err(anyhow!("Ranking API backoff cap must not be below the base delay"));
    }
    if !(0.0..=1.0).contains(&config.ranking.jitter_ratio) {
        return Err(anyhow!("Ranking API jitter ratio must be between 0 and 1"));
    }
    if config.ranking.request_timeout_seconds == 0 {
        return Err(anyhow!("Ranking API request timeout must be greater than 0"));
    }

    // Validate cache settings
    if config.cache.default_ttl_seconds == 0 {
        return Err(anyhow!("Cache TTL must be greater than 0"));
    }
    if config.cache.sweep_interval_seconds == 0 {
        return Err(anyhow!("Cache sweep interval must be greater than 0"));
    }

    if config.lfg.refresh_timeout_seconds == 0 {
        return Err(anyhow!("Group finder refresh timeout must be greater than 0"));
    }
    if config.refresh.enabled && config.refresh.interval_seconds == 0 {
        return Err(anyhow!("Profile refresh interval must be greater than 0"));
    }

    Ok(())
}
