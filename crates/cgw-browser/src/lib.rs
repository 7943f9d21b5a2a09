//! cgw-browser: headless Chrome page controller for chatgpt-wrapper
//!
//! ## Features
//!
//! - Chrome automation via the headless_chrome crate
//! - Persistent profile directory so a one-time interactive login is reused
//! - Engine selection with fallback to the one engine the backend drives
//! - [`ChromePage`], the [`cgw_core::PageController`] the core protocol runs on
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cgw_browser::{BrowserConfig, BrowserSession, ChromePage};
//! use cgw_core::{ChatGpt, Config};
//! use std::sync::Arc;
//!
//! let config = Config::load()?;
//! let session = BrowserSession::launch(BrowserConfig::from_settings(&config.browser))?;
//! let chatgpt = ChatGpt::new(Arc::new(ChromePage::new(session)), &config);
//! ```

pub mod engine;
pub mod error;
pub mod page;
pub mod session;

pub use engine::BrowserEngine;
pub use error::{BrowserError, Result};
pub use page::ChromePage;
pub use session::{BrowserConfig, BrowserConfigBuilder, BrowserSession};
