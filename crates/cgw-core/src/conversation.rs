//! Conversation continuity identifiers

use uuid::Uuid;

use crate::wire::StreamEvent;

/// Identifiers threaded through successive turns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationState {
    /// Assigned by the backend on the first successful turn
    pub conversation_id: Option<String>,
    /// Message the next prompt replies to
    pub parent_message_id: String,
}

impl ConversationState {
    /// Fresh conversation: no backend id, newly generated parent id
    pub fn start_new() -> Self {
        Self {
            conversation_id: None,
            parent_message_id: fresh_id(),
        }
    }

    /// Advance to the ids carried by a parsed event.
    ///
    /// Only the response assembler calls this.
    pub(crate) fn advance(&mut self, event: &StreamEvent) {
        self.parent_message_id = event.message_id.clone();
        if let Some(conversation_id) = &event.conversation_id {
            self.conversation_id = Some(conversation_id.clone());
        }
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::start_new()
    }
}

/// New random message identifier
pub fn fresh_id() -> String {
    Uuid::new_v4().to_string()
}
