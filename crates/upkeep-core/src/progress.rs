//! Progress reporting
//!
//! The executor reports `(version, completed)` pairs in application order and
//! ends every batch with [`UpdateProgress::Finished`], whatever happened, so a
//! caller can always tear down its progress display.

use parking_lot::Mutex;
use std::fmt;
use tokio::sync::mpsc;
use upkeep_ledger::Version;

/// One progress event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateProgress {
    /// Unit is about to be applied
    Started(Version),
    /// Unit committed
    Completed(Version),
    /// Batch over; no unit in progress
    Finished,
}

impl UpdateProgress {
    /// Version of the unit concerned, `None` for [`UpdateProgress::Finished`]
    #[inline]
    #[must_use]
    pub fn version(&self) -> Option<Version> {
        match self {
            Self::Started(v) | Self::Completed(v) => Some(*v),
            Self::Finished => None,
        }
    }

    /// Completion flag of the `(version, completed)` pair
    #[inline]
    #[must_use]
    pub fn completed(&self) -> bool {
        !matches!(self, Self::Started(_))
    }
}

impl fmt::Display for UpdateProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started(v) => write!(f, "installing {v}"),
            Self::Completed(v) => write!(f, "installed {v}"),
            Self::Finished => f.write_str("finished"),
        }
    }
}

/// Receiver of progress events
pub trait ProgressSink: Send + Sync {
    /// Handle one event
    fn report(&self, progress: UpdateProgress);
}

impl<F> ProgressSink for F
where
    F: Fn(UpdateProgress) + Send + Sync,
{
    fn report(&self, progress: UpdateProgress) {
        self(progress);
    }
}

/// Sink that drops every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn report(&self, _progress: UpdateProgress) {}
}

/// Sink that logs every event through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn report(&self, progress: UpdateProgress) {
        tracing::info!(
            version = ?progress.version(),
            completed = progress.completed(),
            "{progress}"
        );
    }
}

/// Sink forwarding events into a tokio channel
///
/// Events are dropped once the receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<UpdateProgress>,
}

impl ChannelSink {
    /// Create a sink and its receiving half
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<UpdateProgress>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl ProgressSink for ChannelSink {
    fn report(&self, progress: UpdateProgress) {
        if self.sender.send(progress).is_err() {
            tracing::trace!("progress receiver dropped");
        }
    }
}

/// Sink collecting events in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<UpdateProgress>>,
}

impl RecordingSink {
    /// Create empty sink
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far
    #[must_use]
    pub fn events(&self) -> Vec<UpdateProgress> {
        self.events.lock().clone()
    }
}

impl ProgressSink for RecordingSink {
    fn report(&self, progress: UpdateProgress) {
        self.events.lock().push(progress);
    }
}
