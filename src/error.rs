//! Error types for the bot

use thiserror::Error;

/// Errors raised while processing a turn
#[derive(Error, Debug)]
pub enum BotError {
    #[error("Dialog not found: {0}")]
    DialogNotFound(String),

    #[error("No active dialog")]
    NoActiveDialog,

    #[error("Turn cancelled")]
    Cancelled,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("State not loaded: {0}")]
    StateNotLoaded(String),

    #[error("Invalid activity: {0}")]
    InvalidActivity(String),

    #[error("Config error: {0}")]
    Config(String),
}

pub type BotResult<T> = std::result::Result<T, BotError>;
