use std::collections::HashSet;

use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tracing::{debug, warn};

use crate::lobby::models::LobbyEvent;

/// Sending half of a player's notification queue.
///
/// The queue is sized for every message a match can produce, so the lobby
/// enqueues with `try_send` while holding its lock and never waits on the
/// consumer. Closing drops the sender, which ends the matching [`PlayerFeed`]
/// once it has drained what was already queued.
#[derive(Debug)]
pub struct Outbox {
    sender: Option<mpsc::Sender<LobbyEvent>>,
}

impl Outbox {
    pub fn close(&mut self) {
        self.sender = None;
    }

    pub fn push(&self, session_id: &str, event: LobbyEvent) {
        let Some(sender) = &self.sender else {
            debug!("Dropping event for {}, outbox is closed", session_id);
            return;
        };

        match sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!("Outbox for {} is full, dropping {:?}", session_id, event);
            }
            // The feed was dropped by the transport, nobody is listening anymore.
            Err(TrySendError::Closed(_)) => {}
        }
    }
}

#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
#[error("Player feed is closed")]
pub struct FeedClosed;

/// Receiving half of a player's notification queue, handed to the transport.
#[derive(Debug)]
pub struct PlayerFeed {
    receiver: mpsc::Receiver<LobbyEvent>,
    undelivered: Option<LobbyEvent>,
}

impl PlayerFeed {
    /// Waits for the next event. `None` once the outbox is closed and drained.
    pub async fn recv(&mut self) -> Option<LobbyEvent> {
        if let Some(event) = self.undelivered.take() {
            return Some(event);
        }

        self.receiver.recv().await
    }

    /// `Ok(None)` means nothing is pending yet.
    pub fn try_next(&mut self) -> Result<Option<LobbyEvent>, FeedClosed> {
        if let Some(event) = self.undelivered.take() {
            return Ok(Some(event));
        }

        match self.receiver.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(FeedClosed),
        }
    }

    /// Puts back an event the transport failed to deliver. It is yielded
    /// again before anything still queued.
    pub fn push_back(&mut self, event: LobbyEvent) {
        self.undelivered = Some(event);
    }
}

#[derive(Debug)]
pub struct Player {
    pub session_id: String,
    pub score: u32,
    answered: HashSet<String>,
    outbox: Outbox,
    feed: Option<PlayerFeed>,
}

impl Player {
    pub fn new(session_id: impl Into<String>, outbox_capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(outbox_capacity.max(1));

        Self {
            session_id: session_id.into(),
            score: 0,
            answered: HashSet::new(),
            outbox: Outbox {
                sender: Some(sender),
            },
            feed: Some(PlayerFeed {
                receiver,
                undelivered: None,
            }),
        }
    }

    pub fn has_answered(&self, question_id: &str) -> bool {
        self.answered.contains(question_id)
    }

    /// Returns false if the question was already recorded.
    pub fn record_answer(&mut self, question_id: &str) -> bool {
        self.answered.insert(question_id.to_string())
    }

    pub fn send(&self, event: LobbyEvent) {
        self.outbox.push(&self.session_id, event);
    }

    pub fn has_feed(&self) -> bool {
        self.feed.is_some()
    }

    pub fn take_feed(&mut self) -> Option<PlayerFeed> {
        self.feed.take()
    }

    pub fn restore_feed(&mut self, feed: PlayerFeed) {
        self.feed = Some(feed);
    }

    pub fn close_outbox(&mut self) {
        self.outbox.close();
    }
}
