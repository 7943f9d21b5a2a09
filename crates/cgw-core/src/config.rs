//! Configuration management
//!
//! Settings are resolved in this order (later wins):
//! 1. Built-in defaults
//! 2. `chatgpt-wrapper.toml` (or an explicit path)
//! 3. Environment variables
//!
//! `${VAR_NAME}` inside the TOML file is expanded from the environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default config file name looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "chatgpt-wrapper.toml";

/// Backend endpoints and the fixed request constants of the conversation API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackendConfig {
    /// Site origin the page is opened on
    pub base_url: String,
    /// Path of the session endpoint (GET, returns the bearer token)
    pub session_path: String,
    /// Path of the conversation endpoint (POST, returns an event stream)
    pub conversation_path: String,
    /// Model identifier sent with every turn
    pub model: String,
    /// Action tag sent with every turn
    pub action: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "https://chat.openai.com".to_string(),
            session_path: "/api/auth/session".to_string(),
            conversation_path: "/backend-api/conversation".to_string(),
            model: "text-davinci-002-render".to_string(),
            action: "next".to_string(),
        }
    }
}

impl BackendConfig {
    /// Absolute URL of the session endpoint
    pub fn session_url(&self) -> String {
        join_url(&self.base_url, &self.session_path)
    }

    /// Absolute URL of the conversation endpoint
    pub fn conversation_url(&self) -> String {
        join_url(&self.base_url, &self.conversation_path)
    }

    /// URL the browser tab is navigated to before any script runs
    pub fn start_url(&self) -> String {
        format!("{}/", self.base_url.trim_end_matches('/'))
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Browser launch settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BrowserSettings {
    /// Requested engine name ("firefox", "chromium", "webkit")
    pub engine: String,
    /// Run without a visible window
    pub headless: bool,
    /// Persistent profile directory holding the login cookies
    pub user_data_dir: PathBuf,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            engine: "firefox".to_string(),
            headless: true,
            user_data_dir: default_user_data_dir(),
        }
    }
}

fn default_user_data_dir() -> PathBuf {
    std::env::temp_dir().join("chatgpt-wrapper")
}

/// Polling cadence and deadlines for the marker channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollConfig {
    pub interval_ms: u64,
    pub session_timeout_secs: u64,
    pub turn_timeout_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 200,
            session_timeout_secs: 30,
            turn_timeout_secs: 180,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    pub fn turn_timeout(&self) -> Duration {
        Duration::from_secs(self.turn_timeout_secs)
    }
}

/// Transcript log settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogConfig {
    /// Append prompts and replies to this file
    pub file: Option<PathBuf>,
}

/// Main configuration for chatgpt-wrapper
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub browser: BrowserSettings,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    /// Replace `${VAR_NAME}` with the value of the environment variable.
    ///
    /// Unset variables expand to an empty string.
    fn expand_env_vars(value: &str) -> String {
        let mut result = String::new();
        let mut chars = value.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '$' && chars.peek() == Some(&'{') {
                chars.next();

                let mut var_name = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    var_name.push(c);
                }

                if let Ok(env_value) = std::env::var(&var_name) {
                    result.push_str(&env_value);
                }
            } else {
                result.push(c);
            }
        }

        result
    }

    /// Load from a TOML file, then apply environment overrides
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let toml_content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let mut cfg = Self::from_toml_str(&toml_content)?;
        cfg.apply_env_overrides();

        Ok(cfg)
    }

    /// Parse TOML content (after `${VAR}` expansion) on top of the defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let expanded = Self::expand_env_vars(content);
        let toml: TomlConfig = toml::from_str(&expanded)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;
        Ok(Self::from_toml_config(toml))
    }

    /// Load from `chatgpt-wrapper.toml` when present, otherwise from the environment
    pub fn load() -> Result<Self> {
        if Path::new(DEFAULT_CONFIG_FILE).exists() {
            return Self::from_toml_file(DEFAULT_CONFIG_FILE);
        }

        Ok(Self::from_env())
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env_overrides();
        cfg
    }

    fn from_toml_config(toml: TomlConfig) -> Self {
        let defaults = Self::default();

        let backend = toml.backend.unwrap_or_default();
        let browser = toml.browser.unwrap_or_default();
        let poll = toml.poll.unwrap_or_default();
        let log = toml.log.unwrap_or_default();

        Config {
            backend: BackendConfig {
                base_url: backend.base_url.unwrap_or(defaults.backend.base_url),
                session_path: backend.session_path.unwrap_or(defaults.backend.session_path),
                conversation_path: backend
                    .conversation_path
                    .unwrap_or(defaults.backend.conversation_path),
                model: backend.model.unwrap_or(defaults.backend.model),
                action: backend.action.unwrap_or(defaults.backend.action),
            },
            browser: BrowserSettings {
                engine: browser.engine.unwrap_or(defaults.browser.engine),
                headless: browser.headless.unwrap_or(defaults.browser.headless),
                user_data_dir: browser
                    .user_data_dir
                    .unwrap_or(defaults.browser.user_data_dir),
            },
            poll: PollConfig {
                interval_ms: poll.interval_ms.unwrap_or(defaults.poll.interval_ms),
                session_timeout_secs: poll
                    .session_timeout_secs
                    .unwrap_or(defaults.poll.session_timeout_secs),
                turn_timeout_secs: poll
                    .turn_timeout_secs
                    .unwrap_or(defaults.poll.turn_timeout_secs),
            },
            log: LogConfig { file: log.file },
        }
    }

    /// Override settings from environment variables
    fn apply_env_overrides(&mut self) {
        if let Some(url) = non_empty_var("CHATGPT_BASE_URL") {
            self.backend.base_url = url;
        }
        if let Some(model) = non_empty_var("CHATGPT_MODEL") {
            self.backend.model = model;
        }

        if let Some(engine) = non_empty_var("CHATGPT_BROWSER") {
            self.browser.engine = engine;
        }
        if let Some(headless) = non_empty_var("CHATGPT_HEADLESS") {
            self.browser.headless = headless.to_lowercase() != "false";
        }
        if let Some(dir) = non_empty_var("CHATGPT_USER_DATA_DIR") {
            self.browser.user_data_dir = PathBuf::from(dir);
        }

        if let Some(ms) = non_empty_var("CHATGPT_POLL_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            self.poll.interval_ms = ms;
        }
        if let Some(secs) =
            non_empty_var("CHATGPT_SESSION_TIMEOUT_SECS").and_then(|v| v.parse().ok())
        {
            self.poll.session_timeout_secs = secs;
        }
        if let Some(secs) = non_empty_var("CHATGPT_TURN_TIMEOUT_SECS").and_then(|v| v.parse().ok())
        {
            self.poll.turn_timeout_secs = secs;
        }

        if let Some(file) = non_empty_var("CHATGPT_LOG_FILE") {
            self.log.file = Some(PathBuf::from(file));
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

// ============================================================================
// TOML file layout
// ============================================================================

#[derive(Debug, Deserialize)]
struct TomlConfig {
    backend: Option<TomlBackendConfig>,
    browser: Option<TomlBrowserConfig>,
    poll: Option<TomlPollConfig>,
    log: Option<TomlLogConfig>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlBackendConfig {
    base_url: Option<String>,
    session_path: Option<String>,
    conversation_path: Option<String>,
    model: Option<String>,
    action: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlBrowserConfig {
    engine: Option<String>,
    headless: Option<bool>,
    user_data_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlPollConfig {
    interval_ms: Option<u64>,
    session_timeout_secs: Option<u64>,
    turn_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlLogConfig {
    file: Option<PathBuf>,
}
