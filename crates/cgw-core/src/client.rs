//! Conversation client
//!
//! Composes session acquisition, the stream relay and the response
//! assembler into complete turns against one tab.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::assembler::{PollOutcome, ResponseAssembler};
use crate::config::{BackendConfig, Config, PollConfig};
use crate::conversation::ConversationState;
use crate::marker::MarkerChannel;
use crate::page::PageController;
use crate::relay::StreamRelay;
use crate::session::{Session, SessionManager};
use crate::{Error, Result};

/// New reply text observed while a turn is streaming
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delta<'a> {
    /// Text appended since the previous delta, or the whole reply when `restart`
    pub text: &'a str,
    /// The backend rewrote earlier text; redraw from scratch
    pub restart: bool,
}

struct TurnState {
    sessions: SessionManager,
    conversation: ConversationState,
}

/// One logical conversation over one browser tab
pub struct ChatGpt<P: ?Sized> {
    channel: MarkerChannel<P>,
    backend: BackendConfig,
    poll: PollConfig,
    relay: StreamRelay,
    /// Held for the whole marker lifecycle of a turn
    state: Mutex<TurnState>,
}

impl<P: PageController + ?Sized> ChatGpt<P> {
    pub fn new(page: Arc<P>, config: &Config) -> Self {
        Self {
            channel: MarkerChannel::new(page),
            backend: config.backend.clone(),
            poll: config.poll.clone(),
            relay: StreamRelay::new(&config.backend),
            state: Mutex::new(TurnState {
                sessions: SessionManager::new(&config.backend, &config.poll),
                conversation: ConversationState::start_new(),
            }),
        }
    }

    /// Navigate the tab to the site so scripts run with its origin and cookies
    pub async fn open(&self) -> Result<()> {
        let url = self.backend.start_url();
        info!("Opening {}", url);
        self.channel.page().navigate(&url).await
    }

    /// Cached session, acquired on first use
    pub async fn session(&self) -> Result<Session> {
        let mut state = self.state.lock().await;
        state.sessions.session(&self.channel).await.cloned()
    }

    /// Re-acquire the session from the page
    pub async fn refresh_session(&self) -> Result<Session> {
        let mut state = self.state.lock().await;
        state.sessions.refresh(&self.channel).await.cloned()
    }

    /// Current continuity identifiers
    pub async fn conversation(&self) -> ConversationState {
        self.state.lock().await.conversation.clone()
    }

    /// Forget the conversation; the next turn starts a new one
    pub async fn new_conversation(&self) -> ConversationState {
        let mut state = self.state.lock().await;
        state.conversation = ConversationState::start_new();
        info!("Started new conversation");
        state.conversation.clone()
    }

    /// Send `prompt` and wait for the complete reply
    pub async fn ask(&self, prompt: &str) -> Result<String> {
        self.ask_with(prompt, |_| {}).await
    }

    /// Send `prompt`, reporting reply growth through `on_delta`
    pub async fn ask_with<F>(&self, prompt: &str, mut on_delta: F) -> Result<String>
    where
        F: FnMut(Delta<'_>),
    {
        let mut guard = self.state.lock().await;
        let TurnState {
            sessions,
            conversation,
        } = &mut *guard;

        let session = sessions.session(&self.channel).await?;
        if let Err(e) = self
            .relay
            .begin_turn(&self.channel, prompt, session, conversation)
            .await
        {
            if matches!(e, Error::SessionUnavailable(_)) {
                // retried on the next call, after the user has had a chance to log in
                sessions.invalidate();
            }
            return Err(e);
        }

        self.await_turn(conversation, &mut on_delta).await
    }

    /// Remove any turn markers left on the page
    pub async fn abort_turn(&self) {
        let _state = self.state.lock().await;
        info!("Aborting turn");
        self.channel.clear_turn_best_effort().await;
    }

    async fn await_turn<F>(
        &self,
        conversation: &mut ConversationState,
        on_delta: &mut F,
    ) -> Result<String>
    where
        F: FnMut(Delta<'_>),
    {
        let mut assembler = ResponseAssembler::new();
        let mut shown = String::new();
        let timeout = self.poll.turn_timeout();
        let deadline = Instant::now() + timeout;

        loop {
            match assembler.poll_turn(&self.channel, conversation).await {
                Ok(PollOutcome::Update(update)) => {
                    emit_delta(&shown, &update.text, on_delta);
                    if update.done {
                        info!("Turn complete ({} chars)", update.text.len());
                        return Ok(update.text);
                    }
                    shown = update.text;
                }
                Ok(PollOutcome::NoData) => {}
                Err(Error::TransientParseMiss(reason)) => {
                    debug!("Transient parse miss, polling again: {}", reason);
                }
                Err(e) => {
                    self.channel.clear_turn_best_effort().await;
                    return Err(e);
                }
            }

            if Instant::now() >= deadline {
                warn!("Turn timed out after {:?}", timeout);
                self.channel.clear_turn_best_effort().await;
                return Err(Error::TurnTimeout(timeout));
            }

            tokio::time::sleep(self.poll.interval()).await;
        }
    }
}

fn emit_delta<F>(shown: &str, text: &str, on_delta: &mut F)
where
    F: FnMut(Delta<'_>),
{
    match text.strip_prefix(shown) {
        Some("") => {}
        Some(suffix) => on_delta(Delta {
            text: suffix,
            restart: false,
        }),
        None => on_delta(Delta {
            text,
            restart: true,
        }),
    }
}
