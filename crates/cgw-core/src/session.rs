//! Session acquisition
//!
//! The bearer token is fetched from the site's own session endpoint by a
//! script running inside the authenticated page, then relayed to the host
//! through the session marker.

use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{BackendConfig, PollConfig};
use crate::marker::{MarkerChannel, MarkerSlot};
use crate::page::PageController;
use crate::script;
use crate::{Error, Result};

/// Session endpoint payload
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Bearer token; absent when the browser profile is not logged in
    pub access_token: Option<String>,
    /// Token expiry as reported by the endpoint
    pub expires: Option<String>,
    /// Full endpoint JSON (user/account metadata)
    pub account: Value,
}

impl Session {
    /// Parse the raw session endpoint body
    pub fn from_json(text: &str) -> Result<Self> {
        let account: Value = serde_json::from_str(text)?;
        Ok(Self::from_value(account))
    }

    pub fn from_value(account: Value) -> Self {
        let access_token = account
            .get("accessToken")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        let expires = account
            .get("expires")
            .and_then(Value::as_str)
            .map(str::to_string);

        Self {
            access_token,
            expires,
            account,
        }
    }

    pub fn is_usable(&self) -> bool {
        self.access_token.is_some()
    }

    /// The bearer token, or [`Error::SessionUnavailable`]
    pub fn bearer(&self) -> Result<&str> {
        self.access_token.as_deref().ok_or_else(|| {
            let reason = self
                .account
                .get("error")
                .and_then(Value::as_str)
                .map(|e| format!("session endpoint reported: {}", e))
                .unwrap_or_else(|| "no accessToken in session".to_string());
            Error::SessionUnavailable(reason)
        })
    }

    /// Logged-in user's name or email, when the endpoint reported one
    pub fn user_display(&self) -> Option<String> {
        let user = self.account.get("user")?;
        user.get("name")
            .or_else(|| user.get("email"))
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

/// Acquires and caches the session of one tab
pub struct SessionManager {
    session_url: String,
    interval: Duration,
    timeout: Duration,
    cached: Option<Session>,
}

impl SessionManager {
    pub fn new(backend: &BackendConfig, poll: &PollConfig) -> Self {
        Self {
            session_url: backend.session_url(),
            interval: poll.interval(),
            timeout: poll.session_timeout(),
            cached: None,
        }
    }

    /// Cached session without touching the page
    pub fn cached(&self) -> Option<&Session> {
        self.cached.as_ref()
    }

    /// Drop the cached session; the next call re-acquires
    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    /// Cached session, acquiring it first when there is none
    pub async fn session<P>(&mut self, channel: &MarkerChannel<P>) -> Result<&Session>
    where
        P: PageController + ?Sized,
    {
        if self.cached.is_none() {
            let session = self.acquire(channel).await?;
            self.cached = Some(session);
        }
        self.cached
            .as_ref()
            .ok_or_else(|| Error::SessionUnavailable("session cache empty".to_string()))
    }

    /// Re-acquire regardless of the cache
    pub async fn refresh<P>(&mut self, channel: &MarkerChannel<P>) -> Result<&Session>
    where
        P: PageController + ?Sized,
    {
        self.invalidate();
        self.session(channel).await
    }

    /// Run the session script and wait for its marker.
    ///
    /// Does not consult or fill the cache.
    pub async fn acquire<P>(&self, channel: &MarkerChannel<P>) -> Result<Session>
    where
        P: PageController + ?Sized,
    {
        info!("Acquiring session from {}", self.session_url);

        channel.remove(MarkerSlot::Session).await?;
        channel
            .page()
            .evaluate(&script::session_script(&self.session_url))
            .await?;

        let deadline = Instant::now() + self.timeout;
        let text = loop {
            if let Some(text) = channel.read(MarkerSlot::Session).await? {
                break text;
            }
            if Instant::now() >= deadline {
                if let Err(e) = channel.remove(MarkerSlot::Session).await {
                    warn!("Failed to remove session marker: {}", e);
                }
                return Err(Error::SessionUnavailable(format!(
                    "session endpoint did not answer within {:?}",
                    self.timeout
                )));
            }
            tokio::time::sleep(self.interval).await;
        };

        if let Err(e) = channel.remove(MarkerSlot::Session).await {
            warn!("Failed to remove session marker: {}", e);
        }

        let session = Session::from_json(&text)
            .map_err(|e| Error::SessionUnavailable(format!("malformed session data: {}", e)))?;

        if session.is_usable() {
            debug!("Session acquired (expires: {:?})", session.expires);
        } else {
            warn!("Session endpoint returned no access token");
        }

        Ok(session)
    }
}
