//! Page controller backed by a Chrome tab
//!
//! headless_chrome is blocking; every call is moved onto the blocking pool.

use std::sync::Arc;

use async_trait::async_trait;
use headless_chrome::Tab;
use serde_json::Value;
use tracing::debug;

use crate::error::BrowserError;
use crate::session::{BrowserSession, navigate_tab};

/// [`cgw_core::PageController`] over the session's tab
pub struct ChromePage {
    session: BrowserSession,
}

impl ChromePage {
    pub fn new(session: BrowserSession) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &BrowserSession {
        &self.session
    }

    async fn with_tab<T, F>(&self, f: F) -> cgw_core::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(Arc<Tab>) -> Result<T, BrowserError> + Send + 'static,
    {
        let tab = self.session.tab();
        tokio::task::spawn_blocking(move || f(tab))
            .await
            .map_err(|e| BrowserError::TabError(format!("Browser task failed: {}", e)))?
            .map_err(Into::into)
    }
}

#[async_trait]
impl cgw_core::PageController for ChromePage {
    async fn navigate(&self, url: &str) -> cgw_core::Result<()> {
        let url = url.to_string();
        self.with_tab(move |tab| navigate_tab(&tab, &url).map(|_| ()))
            .await
    }

    async fn evaluate(&self, script: &str) -> cgw_core::Result<Value> {
        debug!("Evaluating script ({} bytes)", script.len());

        let script = script.to_string();
        self.with_tab(move |tab| {
            let result = tab
                .evaluate(&script, false)
                .map_err(|e| BrowserError::Script(e.to_string()))?;
            Ok(result.value.unwrap_or(Value::Null))
        })
        .await
    }
}
