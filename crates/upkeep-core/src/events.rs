//! "Updates installed" notification
//!
//! Subsystems holding data derived from the configuration (caches, indexes)
//! subscribe here and rebuild when a batch lands.

use tokio::sync::broadcast;
use upkeep_ledger::{LineageKey, Version};

/// Default number of undelivered events kept per subscriber
const EVENT_CAPACITY: usize = 16;

/// Published once after a batch installed all of its units
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatesInstalled {
    /// Lineage the batch belonged to
    pub lineage: LineageKey,
    /// Versions installed by the batch, in application order
    pub versions: Vec<Version>,
    /// Ceiling after the batch
    pub ceiling: Option<Version>,
}

/// Broadcast hub for [`UpdatesInstalled`]
///
/// Clones share the same channel.
#[derive(Debug, Clone)]
pub struct UpdateEvents {
    sender: broadcast::Sender<UpdatesInstalled>,
}

impl UpdateEvents {
    /// Create a hub
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    /// Subscribe to future events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<UpdatesInstalled> {
        self.sender.subscribe()
    }

    /// Number of live subscribers
    #[inline]
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Publish an event; having no subscriber is not an error
    pub fn publish(&self, event: UpdatesInstalled) {
        match self.sender.send(event) {
            Ok(receivers) => tracing::debug!(receivers, "updates-installed event published"),
            Err(_) => tracing::debug!("updates-installed event had no subscribers"),
        }
    }
}

impl Default for UpdateEvents {
    fn default() -> Self {
        Self::new()
    }
}
