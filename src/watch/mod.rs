//! Watch coordinator.
//!
//! Turns the provider's creation events into work: new directories are
//! registered for watching, new files with a supported extension become
//! conversion jobs. Provider errors are logged and never stop the listeners.
//!
//! Files created inside a brand-new directory before it has been registered
//! are not seen. A provider that recurses on its own closes this gap itself,
//! and new directories are then left to it.

pub mod provider;

pub use provider::{
    FileEvent, NotifyProvider, Op, ProviderStreams, Registration, WatchProvider,
};

use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::WatchError;
use crate::events::{EventBus, EventPayload};
use crate::formats::FormatFilter;
use crate::queue::{ConversionJob, JobSender};

/// What the coordinator did with one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A new directory was registered (or was already covered).
    Registered,
    /// A new directory the provider picks up on its own; nothing to do.
    Covered,
    /// Registering a new directory failed; logged.
    RegistrationFailed,
    /// A conversion job was queued.
    Queued,
    /// Not a creation event, or a file with an unsupported extension.
    Ignored,
    /// The workers are gone; nothing can be queued any more.
    QueueClosed,
}

/// Routes provider events to directory registration or the job queue.
pub struct WatchCoordinator {
    provider: Arc<dyn WatchProvider>,
    filter: FormatFilter,
    jobs: JobSender,
    events: Arc<EventBus>,
}

impl WatchCoordinator {
    pub fn new(
        provider: Arc<dyn WatchProvider>,
        filter: FormatFilter,
        jobs: JobSender,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            filter,
            jobs,
            events,
        }
    }

    /// Register a directory tree with the provider.
    pub fn register(&self, dir: &Path) -> Result<Registration, WatchError> {
        match self.provider.add_recursive(dir) {
            Ok(Registration::Added) => {
                tracing::info!("Watching directory: {:?}", dir);
                self.events.broadcast(EventPayload::DirectoryRegistered {
                    path: dir.to_path_buf(),
                });
                Ok(Registration::Added)
            }
            Ok(Registration::AlreadyWatched) => {
                tracing::debug!("Directory already watched: {:?}", dir);
                Ok(Registration::AlreadyWatched)
            }
            Err(e) => {
                tracing::warn!("{}", e);
                self.events
                    .broadcast(EventPayload::DirectoryRegistrationFailed {
                        path: dir.to_path_buf(),
                        error: e.to_string(),
                    });
                Err(e)
            }
        }
    }

    /// Handle a single provider event.
    ///
    /// Queueing waits for a free slot, so a full queue stalls the caller.
    pub async fn dispatch(&self, event: FileEvent) -> Dispatch {
        if event.op != Op::Create {
            return Dispatch::Ignored;
        }

        if event.is_dir {
            if self.provider.recurses_automatically() {
                tracing::debug!("New directory covered by recursive watch: {:?}", event.path);
                return Dispatch::Covered;
            }
            // Registers the directory and whatever already exists below it
            return match self.register(&event.path) {
                Ok(_) => Dispatch::Registered,
                Err(_) => Dispatch::RegistrationFailed,
            };
        }

        if !self.filter.matches(&event.path) {
            tracing::trace!("Ignoring unsupported file: {:?}", event.path);
            return Dispatch::Ignored;
        }

        let path = event.path;
        match self.jobs.submit(ConversionJob::new(path.clone())).await {
            Ok(()) => {
                tracing::debug!("Queued conversion for: {:?}", path);
                self.events.broadcast(EventPayload::JobQueued { path });
                Dispatch::Queued
            }
            Err(e) => {
                tracing::warn!("Failed to queue {:?}: {}", e.0.path(), e);
                Dispatch::QueueClosed
            }
        }
    }

    /// Log an error reported by the provider.
    pub fn report_error(&self, error: WatchError) {
        tracing::error!("{}", error);
        self.events.broadcast(EventPayload::ProviderError {
            error: error.to_string(),
        });
    }

    /// Spawn the event and error listeners.
    ///
    /// Each stream is drained in order by its own task until the stream ends
    /// or `cancel` fires.
    pub fn spawn(
        self: Arc<Self>,
        streams: ProviderStreams,
        cancel: CancellationToken,
    ) -> CoordinatorHandle {
        let ProviderStreams {
            mut events,
            mut errors,
        } = streams;

        let coordinator = Arc::clone(&self);
        let event_cancel = cancel.clone();
        let event_task = tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    biased;

                    _ = event_cancel.cancelled() => break,
                    event = events.recv() => match event {
                        Some(event) => event,
                        None => break,
                    },
                };

                let outcome = tokio::select! {
                    biased;

                    _ = event_cancel.cancelled() => break,
                    outcome = coordinator.dispatch(event) => outcome,
                };

                if outcome == Dispatch::QueueClosed {
                    break;
                }
            }
            tracing::debug!("Watch event listener stopped");
        });

        let coordinator = self;
        let error_task = tokio::spawn(async move {
            loop {
                let error = tokio::select! {
                    biased;

                    _ = cancel.cancelled() => break,
                    error = errors.recv() => match error {
                        Some(error) => error,
                        None => break,
                    },
                };
                coordinator.report_error(error);
            }
            tracing::debug!("Watch error listener stopped");
        });

        CoordinatorHandle {
            event_task,
            error_task,
        }
    }
}

/// Join handles for the two listener tasks.
pub struct CoordinatorHandle {
    event_task: JoinHandle<()>,
    error_task: JoinHandle<()>,
}

impl CoordinatorHandle {
    /// Wait for both listeners to stop.
    pub async fn join(self) {
        for (name, task) in [("event", self.event_task), ("error", self.error_task)] {
            if let Err(e) = task.await {
                tracing::error!("Watch {} listener panicked: {}", name, e);
            }
        }
    }
}
