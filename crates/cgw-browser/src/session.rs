//! Browser session management
//!
//! Launches Chrome on a persistent profile and owns the single tab the
//! conversation runs in.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use cgw_core::BrowserSettings;
use headless_chrome::{Browser, LaunchOptionsBuilder, Tab};
use tracing::{debug, info};

use crate::engine::BrowserEngine;
use crate::error::{BrowserError, Result};

/// Browser session configuration
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Requested engine; resolved to a drivable one at launch
    pub engine: BrowserEngine,
    /// Whether to run in headless mode
    pub headless: bool,
    /// Window width in pixels
    pub width: u32,
    /// Window height in pixels
    pub height: u32,
    /// Navigation timeout in seconds
    pub navigation_timeout: u64,
    /// Persistent profile directory (keeps the login cookies)
    pub user_data_dir: Option<PathBuf>,
    /// Custom user agent
    pub user_agent: Option<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            engine: BrowserEngine::default(),
            headless: true,
            width: 1280,
            height: 900,
            navigation_timeout: 60,
            user_data_dir: None,
            user_agent: None,
        }
    }
}

impl BrowserConfig {
    /// Create a new configuration builder
    pub fn builder() -> BrowserConfigBuilder {
        BrowserConfigBuilder::default()
    }

    /// Configuration from the `[browser]` settings
    pub fn from_settings(settings: &BrowserSettings) -> Self {
        Self::builder()
            .engine(BrowserEngine::parse_or_default(&settings.engine))
            .headless(settings.headless)
            .user_data_dir(settings.user_data_dir.clone())
            .build()
    }
}

/// Builder for BrowserConfig
#[derive(Default)]
pub struct BrowserConfigBuilder {
    config: BrowserConfig,
}

impl BrowserConfigBuilder {
    pub fn engine(mut self, engine: BrowserEngine) -> Self {
        self.config.engine = engine;
        self
    }

    pub fn headless(mut self, headless: bool) -> Self {
        self.config.headless = headless;
        self
    }

    pub fn window_size(mut self, width: u32, height: u32) -> Self {
        self.config.width = width;
        self.config.height = height;
        self
    }

    pub fn navigation_timeout(mut self, seconds: u64) -> Self {
        self.config.navigation_timeout = seconds;
        self
    }

    pub fn user_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.user_data_dir = Some(dir.into());
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = Some(user_agent.into());
        self
    }

    pub fn build(self) -> BrowserConfig {
        self.config
    }
}

/// Chrome instance plus the tab the conversation runs in
pub struct BrowserSession {
    // keeps the browser process alive as long as the tab is in use
    _browser: Browser,
    tab: Arc<Tab>,
    config: BrowserConfig,
    engine: BrowserEngine,
}

impl BrowserSession {
    /// Launch the browser and open a tab
    pub fn launch(config: BrowserConfig) -> Result<Self> {
        use std::ffi::OsStr;

        let engine = BrowserEngine::resolve(config.engine.as_str());

        info!(
            "Launching {} (headless: {}, profile: {:?})",
            engine, config.headless, config.user_data_dir
        );

        if let Some(dir) = &config.user_data_dir {
            std::fs::create_dir_all(dir).map_err(|e| {
                BrowserError::Initialization(format!(
                    "Failed to create profile directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        let args = launch_args(&config);
        let os_args: Vec<&OsStr> = args.iter().map(OsStr::new).collect();

        let launch_options = LaunchOptionsBuilder::default()
            .headless(config.headless)
            .args(os_args)
            .user_data_dir(config.user_data_dir.clone())
            // turns can stream for minutes without CDP traffic
            .idle_browser_timeout(Duration::from_secs(60 * 60))
            .build()
            .map_err(|e| {
                BrowserError::Initialization(format!("Failed to build launch options: {}", e))
            })?;

        let browser = Browser::new(launch_options).map_err(|e| {
            BrowserError::Initialization(format!("Failed to launch browser: {}", e))
        })?;

        let tab = browser
            .new_tab()
            .map_err(|e| BrowserError::TabError(format!("Failed to open tab: {}", e)))?;
        tab.set_default_timeout(Duration::from_secs(config.navigation_timeout));

        info!("Browser session created successfully");

        Ok(Self {
            _browser: browser,
            tab,
            config,
            engine,
        })
    }

    /// The conversation tab
    pub fn tab(&self) -> Arc<Tab> {
        Arc::clone(&self.tab)
    }

    /// Engine actually running
    pub fn engine(&self) -> BrowserEngine {
        self.engine
    }

    /// Navigate the tab and wait for the load
    pub fn navigate(&self, url: &str) -> Result<String> {
        navigate_tab(&self.tab, url)
    }

    /// Get the browser configuration
    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        info!("Closing browser session");
    }
}

fn launch_args(config: &BrowserConfig) -> Vec<String> {
    let mut args = vec![
        format!("--window-size={},{}", config.width, config.height),
        "--no-sandbox".to_string(),
        "--disable-setuid-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-gpu".to_string(),
    ];

    if let Some(ref ua) = config.user_agent {
        args.push(format!("--user-agent={}", ua));
    }

    args
}

/// Navigate `tab` to `url` and return the page title
pub(crate) fn navigate_tab(tab: &Tab, url: &str) -> Result<String> {
    info!("Navigating to: {}", url);

    tab.navigate_to(url).map_err(|e| {
        BrowserError::Navigation(format!("Failed to navigate to {}: {}", url, e))
    })?;

    tab.wait_until_navigated()
        .map_err(|e| BrowserError::Navigation(format!("Navigation timeout: {}", e)))?;

    let title = tab.get_title().unwrap_or_else(|_| "Unknown".to_string());
    debug!("Navigated to: {} (title: {})", url, title);

    Ok(title)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_config_default() {
        let config = BrowserConfig::default();
        assert!(config.headless);
        assert_eq!(config.engine, BrowserEngine::Firefox);
        assert!(config.user_data_dir.is_none());
    }

    #[test]
    fn test_browser_config_builder() {
        let config = BrowserConfig::builder()
            .engine(BrowserEngine::Chromium)
            .headless(false)
            .window_size(800, 600)
            .navigation_timeout(5)
            .user_data_dir("/tmp/profile")
            .user_agent("Custom Agent")
            .build();

        assert_eq!(config.engine, BrowserEngine::Chromium);
        assert!(!config.headless);
        assert_eq!((config.width, config.height), (800, 600));
        assert_eq!(config.navigation_timeout, 5);
        assert_eq!(config.user_data_dir, Some(PathBuf::from("/tmp/profile")));
        assert_eq!(config.user_agent, Some("Custom Agent".to_string()));
    }

    #[test]
    fn test_from_settings() {
        let settings = BrowserSettings {
            engine: "bogus".to_string(),
            headless: false,
            user_data_dir: PathBuf::from("/tmp/p"),
        };
        let config = BrowserConfig::from_settings(&settings);

        assert_eq!(config.engine, BrowserEngine::Firefox);
        assert!(!config.headless);
        assert_eq!(config.user_data_dir, Some(PathBuf::from("/tmp/p")));
    }

    #[test]
    fn test_launch_args() {
        let config = BrowserConfig::builder()
            .window_size(640, 480)
            .user_agent("UA")
            .build();
        let args = launch_args(&config);

        assert!(args.contains(&"--window-size=640,480".to_string()));
        assert!(args.contains(&"--user-agent=UA".to_string()));
    }
}
