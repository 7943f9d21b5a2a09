//! Stream relay: starts a turn inside the page

use tracing::info;

use crate::config::BackendConfig;
use crate::conversation::{ConversationState, fresh_id};
use crate::marker::MarkerChannel;
use crate::page::PageController;
use crate::script;
use crate::session::Session;
use crate::wire::ConversationRequest;
use crate::Result;

/// Identifies a turn that has been handed to the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnTicket {
    /// Id of the user message sent with the turn
    pub message_id: String,
}

/// Issues conversation requests from inside the page
#[derive(Debug, Clone)]
pub struct StreamRelay {
    backend: BackendConfig,
}

impl StreamRelay {
    pub fn new(backend: &BackendConfig) -> Self {
        Self {
            backend: backend.clone(),
        }
    }

    /// Inject the turn script.
    ///
    /// Fails with `SessionUnavailable` before touching the page when the
    /// session carries no bearer token. Stale turn markers are removed first.
    /// The reply is read back with
    /// [`ResponseAssembler::poll_turn`](crate::assembler::ResponseAssembler::poll_turn).
    pub async fn begin_turn<P>(
        &self,
        channel: &MarkerChannel<P>,
        prompt: &str,
        session: &Session,
        conversation: &ConversationState,
    ) -> Result<TurnTicket>
    where
        P: PageController + ?Sized,
    {
        let token = session.bearer()?;

        channel.clear_turn().await?;

        let message_id = fresh_id();
        let request = ConversationRequest::new(&self.backend, &message_id, prompt, conversation);
        let code = script::turn_script(&self.backend.conversation_url(), token, &request)?;

        info!(
            "Starting turn {} (conversation: {:?}, prompt: {} chars)",
            message_id,
            conversation.conversation_id,
            prompt.len()
        );

        channel.page().evaluate(&code).await?;

        Ok(TurnTicket { message_id })
    }
}
