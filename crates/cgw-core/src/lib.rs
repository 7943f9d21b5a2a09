//! cgw-core: ChatGPT Wrapper Core Library
//!
//! Drives the ChatGPT web backend through an authenticated browser tab.
//! Requests are issued by scripts injected into the page, so they carry the
//! page's cookies and origin; results come back through transient DOM marker
//! nodes that the host polls.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cgw_core::{ChatGpt, Config};
//! use std::sync::Arc;
//!
//! let config = Config::load()?;
//! let chatgpt = ChatGpt::new(Arc::new(page), &config);
//! chatgpt.open().await?;
//! let reply = chatgpt.ask("Hello").await?;
//! ```

pub mod assembler;
pub mod client;
pub mod config;
pub mod conversation;
pub mod error;
pub mod marker;
pub mod page;
pub mod relay;
pub mod script;
pub mod session;
pub mod wire;

#[cfg(test)]
pub(crate) mod testing;

pub use assembler::{PollOutcome, ResponseAssembler, TurnUpdate};
pub use client::{ChatGpt, Delta};
pub use config::{BackendConfig, BrowserSettings, Config, LogConfig, PollConfig};
pub use conversation::ConversationState;
pub use error::{Error, Result};
pub use marker::{MarkerChannel, MarkerSlot};
pub use page::PageController;
pub use relay::{StreamRelay, TurnTicket};
pub use session::{Session, SessionManager};
pub use wire::{ConversationRequest, StreamEvent};
