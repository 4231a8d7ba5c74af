//! Error types for the bot
//!
//! Domain failures are described by [`KeymasterError`]; everything is carried
//! through the crate as `anyhow::Result` so callers can attach context and
//! recover the typed error with `downcast_ref` where the distinction matters.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific bot scenarios
#[derive(Debug, thiserror::Error)]
pub enum KeymasterError {
    /// 429/5xx or a transport failure that survived every retry attempt
    #[error("Ranking API temporarily unavailable after {attempts} attempts: {message}")]
    RankingUnavailable { attempts: u32, message: String },

    #[error("Ranking API request failed with status {status}: {message}")]
    RankingRequestFailed { status: u16, message: String },

    #[error("Ranking API returned an unexpected response: {message}")]
    MalformedResponse { message: String },

    #[error("User {user_id} has not registered a character")]
    NotRegistered { user_id: u64 },

    #[error("Group finder session not found: {message_id}")]
    SessionNotFound { message_id: u64 },

    #[error("Only the group leader can close group {message_id}")]
    NotSessionOwner { message_id: u64, user_id: u64 },

    #[error("Group finder session {message_id} is already closed")]
    SessionClosed { message_id: u64 },

    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("Storage error: {message}")]
    StorageError { message: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal error: {message}")]
    InternalError { message: String },
}

impl KeymasterError {
    /// Whether the failure came from the ranking API being unreachable or
    /// overloaded, as opposed to a request the API rejected outright
    pub fn is_transient(&self) -> bool {
        matches!(self, KeymasterError::RankingUnavailable { .. })
    }
}
