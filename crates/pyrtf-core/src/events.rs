//! Event types for CLI consumption.
//!
//! A background generation reports its progress through a
//! [`GenerationStream`], which the TUI polls between frames and feeds into
//! its [`GenerationSession`](crate::GenerationSession).

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::error;

use crate::error::GenerationFailure;
use crate::result::GenerationResult;

/// Events emitted by a background generation.
#[derive(Debug, Clone)]
pub enum GenerationEvent {
    /// The request was sent to the provider.
    Started {
        /// Provider name.
        provider: String,
        /// Model identifier.
        model: String,
    },

    /// The provider replied and the reply was interpreted.
    Completed(GenerationResult),

    /// The request failed.
    Failed(GenerationFailure),
}

impl GenerationEvent {
    /// Returns whether this event ends the generation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Failed(_))
    }
}

/// Handle for consuming the events of one background generation.
#[derive(Debug)]
pub struct GenerationStream {
    event_rx: mpsc::Receiver<GenerationEvent>,
    finished: bool,
}

impl GenerationStream {
    /// Create a new stream with the given channel.
    pub(crate) fn new(event_rx: mpsc::Receiver<GenerationEvent>) -> Self {
        Self {
            event_rx,
            finished: false,
        }
    }

    /// Wait for the next event.
    ///
    /// Returns `None` once the terminal event has been delivered.
    pub async fn next(&mut self) -> Option<GenerationEvent> {
        if self.finished {
            return None;
        }
        let event = self.event_rx.recv().await;
        self.observe(event)
    }

    /// Take the next event if one is ready, without waiting.
    pub fn try_next(&mut self) -> Option<GenerationEvent> {
        if self.finished {
            return None;
        }
        match self.event_rx.try_recv() {
            Ok(event) => self.observe(Some(event)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => self.observe(None),
        }
    }

    /// Returns whether the terminal event has been delivered.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Track termination. A channel closed before a terminal event becomes a
    /// failure so the consumer never stays in the generating state.
    fn observe(&mut self, event: Option<GenerationEvent>) -> Option<GenerationEvent> {
        match event {
            Some(event) => {
                self.finished = event.is_terminal();
                Some(event)
            }
            None => {
                error!("generation task ended without reporting an outcome");
                self.finished = true;
                Some(GenerationEvent::Failed(GenerationFailure::default()))
            }
        }
    }
}
