//! Error types for the bot

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, BotError>;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    /// Upstream API answered with a non-success status or an unusable body
    #[error("API error: {0}")]
    Api(String),

    /// Telegram Bot API answered `ok: false`
    #[error("Telegram API error: {0}")]
    Telegram(String),

    #[error("Event not found: {0}")]
    EventNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage error at {path}: {message}")]
    Storage { path: String, message: String },
}

impl From<config::ConfigError> for BotError {
    fn from(e: config::ConfigError) -> Self {
        BotError::Config(e.to_string())
    }
}

impl BotError {
    /// Errors the requesting user caused, as opposed to infrastructure failures
    pub fn is_user_facing(&self) -> bool {
        matches!(self, BotError::EventNotFound(_) | BotError::InvalidInput(_))
    }
}
