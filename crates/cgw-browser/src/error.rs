//! Error types for cgw-browser

use thiserror::Error;

/// cgw-browser error type
#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("Browser initialization failed: {0}")]
    Initialization(String),

    #[error("Unknown browser engine: {0}")]
    UnknownEngine(String),

    #[error("Browser engine '{0}' cannot be driven by the headless Chrome backend")]
    EngineUnavailable(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Script evaluation failed: {0}")]
    Script(String),

    #[error("Tab error: {0}")]
    TabError(String),
}

impl From<BrowserError> for cgw_core::Error {
    fn from(err: BrowserError) -> Self {
        match err {
            BrowserError::EngineUnavailable(engine) => {
                cgw_core::Error::BrowserEngineUnavailable(engine)
            }
            other => cgw_core::Error::Page(other.to_string()),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, BrowserError>;
