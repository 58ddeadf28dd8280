//! Pipeline event system.
//!
//! [`EventBus`] wraps a `tokio::sync::broadcast` channel with a bounded
//! ring-buffer of recent events so observers (and tests) can inspect what the
//! watcher and workers did without scraping log output.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::broadcast;

/// Maximum number of events retained in the ring buffer.
const MAX_RECENT_EVENTS: usize = 256;

/// What happened in the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    // -- Watcher -------------------------------------------------------------
    DirectoryRegistered {
        path: PathBuf,
    },
    DirectoryRegistrationFailed {
        path: PathBuf,
        error: String,
    },
    ProviderError {
        error: String,
    },
    JobQueued {
        path: PathBuf,
    },

    // -- Conversion ----------------------------------------------------------
    ConversionCompleted {
        worker: usize,
        source: PathBuf,
        output: PathBuf,
        elapsed: Duration,
    },
    ConversionFailed {
        worker: usize,
        source: PathBuf,
        error: String,
        elapsed: Duration,
    },
    /// The WebP file was written but the original could not be removed.
    DeleteFailed {
        worker: usize,
        source: PathBuf,
        error: String,
    },
}

/// A timestamped event ready for broadcast.
#[derive(Debug, Clone)]
pub struct Event {
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub payload: EventPayload,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// Broadcast channel with a bounded ring buffer of recent events.
#[derive(Debug)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
    recent: RwLock<VecDeque<Event>>,
}

impl EventBus {
    /// Create a new event bus.
    ///
    /// `capacity` controls the broadcast channel buffer size (not the ring
    /// buffer, which is always [`MAX_RECENT_EVENTS`]).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            recent: RwLock::new(VecDeque::with_capacity(MAX_RECENT_EVENTS)),
        }
    }

    /// Subscribe to the broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Broadcast an event to all current subscribers and store it in the
    /// ring buffer.
    pub fn broadcast(&self, payload: EventPayload) {
        let event = Event::new(payload);

        {
            let mut recent = self.recent.write();
            if recent.len() >= MAX_RECENT_EVENTS {
                recent.pop_front();
            }
            recent.push_back(event.clone());
        }

        if self.tx.send(event).is_err() {
            tracing::trace!("No subscribers for pipeline event");
        }
    }

    /// Snapshot of the retained events, oldest first.
    pub fn recent(&self) -> Vec<Event> {
        self.recent.read().iter().cloned().collect()
    }

    /// Retained payloads, oldest first.
    pub fn recent_payloads(&self) -> Vec<EventPayload> {
        self.recent.read().iter().map(|e| e.payload.clone()).collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
