//! Error types for cgw-core

use std::time::Duration;

use thiserror::Error;

/// Main error type for cgw-core
#[derive(Error, Debug)]
pub enum Error {
    /// No usable bearer token. The user has to log in interactively.
    #[error(
        "Your ChatGPT session is not usable ({0}).\n\
         * Run this program with the `install` parameter and log in to ChatGPT.\n\
         * If you think you are already logged in, try running the `/session` command."
    )]
    SessionUnavailable(String),

    /// A poll observed a partially written marker. Retried by polling, never shown.
    #[error("Marker snapshot was incomplete: {0}")]
    TransientParseMiss(String),

    #[error("No completion signal within {0:?}; the reply may still be generating, try again")]
    TurnTimeout(Duration),

    #[error("Unusable response produced by ChatGPT, maybe it's unavailable (status {status})")]
    EmptyResponse { status: u16 },

    #[error("Browser engine unavailable: {0}")]
    BrowserEngineUnavailable(String),

    #[error("Page error: {0}")]
    Page(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether repeating the same call can succeed without user action
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::TransientParseMiss(_) | Error::TurnTimeout(_))
    }
}

/// Result type alias for cgw-core
pub type Result<T> = std::result::Result<T, Error>;
