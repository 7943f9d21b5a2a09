//! Page controller contract
//!
//! The only view the protocol has of the browser: one tab that can be
//! navigated, can run script in the page's own execution context, and holds
//! marker nodes addressable by element id.

use async_trait::async_trait;
use serde_json::Value;

use crate::Result;

/// One browser tab owned by the caller
#[async_trait]
pub trait PageController: Send + Sync {
    /// Navigate the tab and wait for the load to finish
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Run `script` in the page context and return its completion value
    async fn evaluate(&self, script: &str) -> Result<Value>;

    /// Text content of the element with `id`, or `None` when it does not exist
    async fn read_marker(&self, id: &str) -> Result<Option<String>> {
        let script = format!(
            "(() => {{ const el = document.getElementById({}); return el === null ? null : el.textContent; }})()",
            js_string(id)
        );
        match self.evaluate(&script).await? {
            Value::String(text) => Ok(Some(text)),
            Value::Null => Ok(None),
            other => Ok(Some(other.to_string())),
        }
    }

    /// Remove every element with `id`. Returns whether anything was removed.
    async fn remove_marker(&self, id: &str) -> Result<bool> {
        let script = format!(
            "(() => {{ let n = 0; let el; while ((el = document.getElementById({})) !== null) {{ el.remove(); n++; }} return n > 0; }})()",
            js_string(id)
        );
        Ok(self.evaluate(&script).await?.as_bool().unwrap_or(false))
    }
}

/// Encode `value` as a JavaScript string literal
pub(crate) fn js_string(value: &str) -> String {
    // A JSON string is a valid JS literal; escape the two separators JSON allows raw
    serde_json::to_string(value)
        .unwrap_or_else(|_| "\"\"".to_string())
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
}
