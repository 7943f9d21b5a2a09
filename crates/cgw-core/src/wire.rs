//! Backend wire types
//!
//! The request body posted to the conversation endpoint and the event
//! payloads it streams back. Field names follow the backend exactly.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::config::BackendConfig;
use crate::conversation::ConversationState;
use crate::{Error, Result};

/// Body of a conversation turn request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationRequest {
    pub messages: Vec<RequestMessage>,
    pub model: String,
    /// `null` until the backend has assigned one
    pub conversation_id: Option<String>,
    pub parent_message_id: String,
    pub action: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestMessage {
    pub id: String,
    pub role: String,
    pub content: MessageContent,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageContent {
    pub content_type: String,
    #[serde(default)]
    pub parts: Vec<String>,
}

impl ConversationRequest {
    /// Build the request for `prompt` continuing from `conversation`
    pub fn new(
        backend: &BackendConfig,
        message_id: impl Into<String>,
        prompt: impl Into<String>,
        conversation: &ConversationState,
    ) -> Self {
        Self {
            messages: vec![RequestMessage {
                id: message_id.into(),
                role: "user".to_string(),
                content: MessageContent {
                    content_type: "text".to_string(),
                    parts: vec![prompt.into()],
                },
            }],
            model: backend.model.clone(),
            conversation_id: conversation.conversation_id.clone(),
            parent_message_id: conversation.parent_message_id.clone(),
            action: backend.action.clone(),
        }
    }
}

/// Raw event payload as streamed by the backend
#[derive(Debug, Deserialize)]
struct RawEvent {
    message: RawMessage,
    #[serde(default)]
    conversation_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    id: String,
    content: MessageContent,
}

/// One decoded snapshot of backend progress.
///
/// Snapshots are cumulative: `parts` holds the full text generated so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEvent {
    pub message_id: String,
    pub conversation_id: Option<String>,
    pub parts: Vec<String>,
}

impl StreamEvent {
    /// Parse one event payload (the JSON after the `data: ` prefix)
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let raw: RawEvent = serde_json::from_slice(bytes)?;
        Ok(Self {
            message_id: raw.message.id,
            conversation_id: raw.conversation_id,
            parts: raw.message.content.parts,
        })
    }

    /// Full response text so far
    pub fn text(&self) -> String {
        self.parts.join("\n")
    }
}

/// Decode the content of the stream marker.
///
/// `Ok(None)` means the marker holds no event yet. Undecodable content is a
/// [`Error::TransientParseMiss`]: the page may be mid-write.
pub fn decode_snapshot(encoded: &str) -> Result<Option<StreamEvent>> {
    let encoded = encoded.trim();
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| Error::TransientParseMiss(format!("base64: {}", e)))?;

    if bytes.is_empty() {
        return Ok(None);
    }

    StreamEvent::from_json(&bytes)
        .map(Some)
        .map_err(|e| Error::TransientParseMiss(format!("json: {}", e)))
}
