//! Browser engine selection

use std::fmt;
use std::str::FromStr;

use tracing::warn;

use crate::error::{BrowserError, Result};

/// Engines a user may ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BrowserEngine {
    #[default]
    Firefox,
    Chromium,
    Webkit,
}

impl BrowserEngine {
    pub fn as_str(self) -> &'static str {
        match self {
            BrowserEngine::Firefox => "firefox",
            BrowserEngine::Chromium => "chromium",
            BrowserEngine::Webkit => "webkit",
        }
    }

    /// Parse `name`, warning and falling back to the default on unknown names
    pub fn parse_or_default(name: &str) -> Self {
        name.parse().unwrap_or_else(|e| {
            let fallback = Self::default();
            warn!("{}, falling back on {}", e, fallback);
            fallback
        })
    }

    /// Whether the headless Chrome backend can drive this engine
    pub fn ensure_supported(self) -> Result<Self> {
        match self {
            BrowserEngine::Chromium => Ok(self),
            other => Err(BrowserError::EngineUnavailable(other.to_string())),
        }
    }

    /// Engine actually launched for a requested name.
    ///
    /// Unknown names fall back to the default engine; engines the backend
    /// cannot drive fall back to chromium. Both only warn.
    pub fn resolve(name: &str) -> Self {
        let requested = Self::parse_or_default(name);
        requested.ensure_supported().unwrap_or_else(|e| {
            warn!("{}, falling back on {}", e, BrowserEngine::Chromium);
            BrowserEngine::Chromium
        })
    }
}

impl fmt::Display for BrowserEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BrowserEngine {
    type Err = BrowserError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "firefox" => Ok(BrowserEngine::Firefox),
            "chromium" | "chrome" => Ok(BrowserEngine::Chromium),
            "webkit" => Ok(BrowserEngine::Webkit),
            other => Err(BrowserError::UnknownEngine(other.to_string())),
        }
    }
}
