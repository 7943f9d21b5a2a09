//! Response assembly from the turn markers

use tracing::debug;

use crate::conversation::ConversationState;
use crate::marker::{MarkerChannel, MarkerSlot};
use crate::page::PageController;
use crate::wire::decode_snapshot;
use crate::{Error, Result};

/// Cumulative reply text observed by a poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnUpdate {
    pub text: String,
    pub done: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The turn has not produced an event yet
    NoData,
    Update(TurnUpdate),
}

/// Reads one turn's markers. Create one per turn.
#[derive(Debug, Default)]
pub struct ResponseAssembler {
    last_text: Option<String>,
}

impl ResponseAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the markers once.
    ///
    /// A successfully parsed event advances `conversation`. A partially
    /// written snapshot yields [`Error::TransientParseMiss`]; poll again.
    /// Once the eof marker is seen both turn markers are removed.
    pub async fn poll_turn<P>(
        &mut self,
        channel: &MarkerChannel<P>,
        conversation: &mut ConversationState,
    ) -> Result<PollOutcome>
    where
        P: PageController + ?Sized,
    {
        // eof is written after the final stream update, so read it first
        let eof = channel.read(MarkerSlot::Eof).await?;
        let stream = channel.read(MarkerSlot::Stream).await?;

        let mut miss = None;
        if let Some(encoded) = stream {
            match decode_snapshot(&encoded) {
                Ok(Some(event)) => {
                    conversation.advance(&event);
                    self.last_text = Some(event.text());
                }
                Ok(None) => {}
                Err(Error::TransientParseMiss(reason)) => {
                    debug!("Skipping incomplete snapshot: {}", reason);
                    miss = Some(reason);
                }
                Err(e) => return Err(e),
            }
        }

        if let Some(status) = eof {
            channel.clear_turn().await?;
            let status = status.trim().parse().unwrap_or(0);
            return match self.last_text.take() {
                Some(text) => Ok(PollOutcome::Update(TurnUpdate { text, done: true })),
                None => Err(Error::EmptyResponse { status }),
            };
        }

        if let Some(reason) = miss {
            return Err(Error::TransientParseMiss(reason));
        }

        Ok(match &self.last_text {
            Some(text) => PollOutcome::Update(TurnUpdate {
                text: text.clone(),
                done: false,
            }),
            None => PollOutcome::NoData,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakePage, encode_event, event_json};
    use std::sync::Arc;

    fn setup() -> (Arc<FakePage>, MarkerChannel<FakePage>, ConversationState) {
        let page = Arc::new(FakePage::new());
        let channel = MarkerChannel::new(page.clone());
        (page, channel, ConversationState::start_new())
    }

    #[tokio::test]
    async fn test_no_marker_is_no_data() {
        let (_page, channel, mut conversation) = setup();
        let before = conversation.clone();

        let outcome = ResponseAssembler::new()
            .poll_turn(&channel, &mut conversation)
            .await
            .unwrap();

        assert_eq!(outcome, PollOutcome::NoData);
        assert_eq!(conversation, before);
    }

    #[tokio::test]
    async fn test_empty_marker_is_no_data() {
        let (page, channel, mut conversation) = setup();
        page.set_marker(MarkerSlot::Stream.id(), "");

        let outcome = ResponseAssembler::new()
            .poll_turn(&channel, &mut conversation)
            .await
            .unwrap();
        assert_eq!(outcome, PollOutcome::NoData);
    }

    #[tokio::test]
    async fn test_in_progress_snapshot_advances_state() {
        let (page, channel, mut conversation) = setup();
        page.set_marker(
            MarkerSlot::Stream.id(),
            &encode_event(&event_json("m1", "c1", &["Hel"])),
        );

        let outcome = ResponseAssembler::new()
            .poll_turn(&channel, &mut conversation)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            PollOutcome::Update(TurnUpdate {
                text: "Hel".to_string(),
                done: false
            })
        );
        assert_eq!(conversation.parent_message_id, "m1");
        assert_eq!(conversation.conversation_id.as_deref(), Some("c1"));
        assert!(page.has_marker(MarkerSlot::Stream.id()));
    }

    #[tokio::test]
    async fn test_done_on_same_poll_as_final_text() {
        let (page, channel, mut conversation) = setup();
        page.set_marker(
            MarkerSlot::Stream.id(),
            &encode_event(&event_json("m2", "c1", &["Hello there"])),
        );
        page.set_marker(MarkerSlot::Eof.id(), "200");

        let outcome = ResponseAssembler::new()
            .poll_turn(&channel, &mut conversation)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            PollOutcome::Update(TurnUpdate {
                text: "Hello there".to_string(),
                done: true
            })
        );
        assert!(!page.has_marker(MarkerSlot::Stream.id()));
        assert!(!page.has_marker(MarkerSlot::Eof.id()));
    }

    #[tokio::test]
    async fn test_done_on_later_poll_without_new_text() {
        let (page, channel, mut conversation) = setup();
        let mut assembler = ResponseAssembler::new();
        page.set_marker(
            MarkerSlot::Stream.id(),
            &encode_event(&event_json("m2", "c1", &["Hello there"])),
        );
        assembler.poll_turn(&channel, &mut conversation).await.unwrap();

        // page overwrote the marker with something unreadable, then finished
        page.set_marker(MarkerSlot::Stream.id(), "");
        page.set_marker(MarkerSlot::Eof.id(), "200");

        let outcome = assembler.poll_turn(&channel, &mut conversation).await.unwrap();
        assert_eq!(
            outcome,
            PollOutcome::Update(TurnUpdate {
                text: "Hello there".to_string(),
                done: true
            })
        );
    }

    #[tokio::test]
    async fn test_partial_snapshot_is_transient() {
        let (page, channel, mut conversation) = setup();
        let before = conversation.clone();
        page.set_marker(MarkerSlot::Stream.id(), &encode_event(r#"{"message": "#));

        let err = ResponseAssembler::new()
            .poll_turn(&channel, &mut conversation)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::TransientParseMiss(_)));
        assert_eq!(conversation, before);
        assert!(page.has_marker(MarkerSlot::Stream.id()));
    }

    #[tokio::test]
    async fn test_eof_without_event_is_empty_response() {
        let (page, channel, mut conversation) = setup();
        page.set_marker(MarkerSlot::Stream.id(), "");
        page.set_marker(MarkerSlot::Eof.id(), "429");

        let err = ResponseAssembler::new()
            .poll_turn(&channel, &mut conversation)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::EmptyResponse { status: 429 }));
        assert!(!page.has_marker(MarkerSlot::Stream.id()));
        assert!(!page.has_marker(MarkerSlot::Eof.id()));
    }
}
