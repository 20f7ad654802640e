//! Change notifications from the backend.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::models::ItemId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
    /// Something changed, but the feed cannot tell what.
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub record_id: Option<ItemId>,
}

impl ChangeEvent {
    #[must_use]
    pub const fn new(kind: ChangeKind, record_id: Option<ItemId>) -> Self {
        Self { kind, record_id }
    }
}

/// A live change feed. Dropping it releases the feed.
#[derive(Debug)]
pub struct ChangeSubscription {
    events: mpsc::Receiver<ChangeEvent>,
    producer: Option<JoinHandle<()>>,
}

impl ChangeSubscription {
    /// Feed driven by whoever holds the matching sender.
    #[must_use]
    pub const fn from_receiver(events: mpsc::Receiver<ChangeEvent>) -> Self {
        Self {
            events,
            producer: None,
        }
    }

    /// Feed driven by a background task that is aborted on release.
    #[must_use]
    pub const fn with_producer(events: mpsc::Receiver<ChangeEvent>, producer: JoinHandle<()>) -> Self {
        Self {
            events,
            producer: Some(producer),
        }
    }

    /// Next change, or `None` once the feed has closed.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }

    /// Release the feed explicitly.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        self.events.close();
        if let Some(producer) = self.producer.take() {
            producer.abort();
        }
    }
}

impl Drop for ChangeSubscription {
    fn drop(&mut self) {
        self.release();
    }
}
