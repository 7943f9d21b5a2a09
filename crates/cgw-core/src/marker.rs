//! DOM marker channel
//!
//! The page and the host exchange data through transient nodes with
//! well-known ids. Each slot supports create/overwrite (page side) and
//! read/delete (host side).

use std::sync::Arc;

use tracing::{debug, warn};

use crate::page::PageController;
use crate::Result;

/// Named relay slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerSlot {
    /// Latest base64 encoded event of the running turn
    Stream,
    /// Present once the turn's stream has terminated
    Eof,
    /// Raw JSON of the session endpoint
    Session,
}

impl MarkerSlot {
    /// Element id of the slot on the page
    pub fn id(self) -> &'static str {
        match self {
            MarkerSlot::Stream => "chatgpt-wrapper-conversation-stream-data",
            MarkerSlot::Eof => "chatgpt-wrapper-conversation-stream-data-eof",
            MarkerSlot::Session => "chatgpt-wrapper-session-data",
        }
    }

    /// Slots used by a conversation turn
    pub const TURN: [MarkerSlot; 2] = [MarkerSlot::Stream, MarkerSlot::Eof];
}

/// Host side of the marker channel for one tab
pub struct MarkerChannel<P: ?Sized> {
    page: Arc<P>,
}

impl<P: ?Sized> Clone for MarkerChannel<P> {
    fn clone(&self) -> Self {
        Self {
            page: Arc::clone(&self.page),
        }
    }
}

impl<P: PageController + ?Sized> MarkerChannel<P> {
    pub fn new(page: Arc<P>) -> Self {
        Self { page }
    }

    /// The tab this channel relays through
    pub fn page(&self) -> &Arc<P> {
        &self.page
    }

    /// Current content of `slot`, `None` when the node is absent
    pub async fn read(&self, slot: MarkerSlot) -> Result<Option<String>> {
        self.page.read_marker(slot.id()).await
    }

    /// Whether `slot` currently exists on the page
    pub async fn is_present(&self, slot: MarkerSlot) -> Result<bool> {
        Ok(self.read(slot).await?.is_some())
    }

    pub async fn remove(&self, slot: MarkerSlot) -> Result<bool> {
        let removed = self.page.remove_marker(slot.id()).await?;
        if removed {
            debug!("Removed marker {}", slot.id());
        }
        Ok(removed)
    }

    /// Remove the stream and eof markers so the next turn starts clean
    pub async fn clear_turn(&self) -> Result<()> {
        for slot in MarkerSlot::TURN {
            self.remove(slot).await?;
        }
        Ok(())
    }

    /// Same as [`clear_turn`](Self::clear_turn) but only logs failures
    pub async fn clear_turn_best_effort(&self) {
        if let Err(e) = self.clear_turn().await {
            warn!("Failed to clear turn markers: {}", e);
        }
    }
}
