use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    // Configuration errors
    #[error("Missing required setting: {name}")]
    ConfigMissing { name: String },

    #[error("Invalid config: {message}")]
    ConfigValidation { message: String },

    // Storage errors
    #[error("Storage error: {source}")]
    Storage {
        #[source]
        source: sqlx::Error,
    },

    #[error("Failed to prepare database path '{path}': {source}")]
    StoragePath {
        path: String,
        #[source]
        source: std::io::Error,
    },

    // Legacy import errors
    #[error("Failed to read legacy data file '{path}': {source}")]
    LegacyLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse legacy data file '{path}': {source}")]
    LegacyParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    // Discord errors
    #[error("Discord API error: {message}")]
    Discord { message: String },

    #[error(transparent)]
    Platform(#[from] crate::platform::PlatformError),

    // Generic errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl From<sqlx::Error> for BotError {
    fn from(err: sqlx::Error) -> Self {
        BotError::Storage { source: err }
    }
}

impl From<serenity::Error> for BotError {
    fn from(err: serenity::Error) -> Self {
        BotError::Discord {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for BotError {
    fn from(err: std::io::Error) -> Self {
        BotError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for BotError {
    fn from(err: serde_json::Error) -> Self {
        BotError::Internal {
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BotError>;

use poise::serenity_prelude as serenity;
