//! Filesystem change notification provider.
//!
//! The coordinator only needs two things from a provider: a way to register a
//! directory tree, and the event/error streams handed out at construction.
//! [`NotifyProvider`] implements this on top of the `notify` crate.

use notify::event::{CreateKind, ModifyKind};
use notify::{EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

use crate::config::{WatchBackend, WatchConfig};
use crate::error::WatchError;

/// Buffer size for the provider's event and error streams.
const STREAM_BUFFER: usize = 256;

/// Kind of change reported for a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Create,
    Remove,
    Rename,
    Other,
}

/// A single change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub path: PathBuf,
    pub op: Op,
    pub is_dir: bool,
}

impl FileEvent {
    pub fn created_file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            op: Op::Create,
            is_dir: false,
        }
    }

    pub fn created_dir(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            op: Op::Create,
            is_dir: true,
        }
    }
}

/// Streams produced by a provider for its whole lifetime.
#[derive(Debug)]
pub struct ProviderStreams {
    pub events: mpsc::Receiver<FileEvent>,
    pub errors: mpsc::Receiver<WatchError>,
}

/// Outcome of a successful registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// The directory is now being watched.
    Added,
    /// The directory was already covered by a recursive watch.
    AlreadyWatched,
}

/// A source of filesystem creation events.
pub trait WatchProvider: Send + Sync {
    /// Watch `path` and everything below it.
    fn add_recursive(&self, path: &Path) -> Result<Registration, WatchError>;

    /// Whether directories created under a watched tree are picked up without
    /// an explicit registration.
    fn recurses_automatically(&self) -> bool {
        false
    }
}

/// `notify`-backed provider forwarding creation events only.
pub struct NotifyProvider {
    watcher: Mutex<Box<dyn Watcher + Send>>,
    targets: Mutex<Vec<PathBuf>>,
}

impl NotifyProvider {
    /// Create the watcher for the configured backend.
    ///
    /// Nothing is reported until a directory is registered with
    /// [`WatchProvider::add_recursive`].
    pub fn new(config: &WatchConfig) -> Result<(Self, ProviderStreams), WatchError> {
        let (event_tx, event_rx) = mpsc::channel::<FileEvent>(STREAM_BUFFER);
        let (error_tx, error_rx) = mpsc::channel::<WatchError>(STREAM_BUFFER);

        // Normally runs on the watcher's own thread, where blocking sends
        // give backpressure all the way to the provider
        let handler = move |res: notify::Result<notify::Event>| match res {
            Ok(event) => {
                for event in translate(event) {
                    if event.op != Op::Create {
                        continue;
                    }
                    if !forward(&event_tx, event) {
                        return;
                    }
                }
            }
            Err(e) => {
                forward(&error_tx, WatchError::Provider(e.to_string()));
            }
        };

        let watcher: Box<dyn Watcher + Send> = match config.backend {
            WatchBackend::Native => Box::new(
                RecommendedWatcher::new(handler, notify::Config::default())
                    .map_err(|e| WatchError::Init(e.to_string()))?,
            ),
            WatchBackend::Poll => Box::new(
                PollWatcher::new(
                    handler,
                    notify::Config::default().with_poll_interval(config.poll_interval()),
                )
                .map_err(|e| WatchError::Init(e.to_string()))?,
            ),
        };

        tracing::debug!("Created {:?} file watcher", config.backend);

        Ok((
            Self {
                watcher: Mutex::new(watcher),
                targets: Mutex::new(Vec::new()),
            },
            ProviderStreams {
                events: event_rx,
                errors: error_rx,
            },
        ))
    }

    /// Directories registered so far.
    pub fn targets(&self) -> Vec<PathBuf> {
        self.targets.lock().clone()
    }
}

impl WatchProvider for NotifyProvider {
    fn add_recursive(&self, path: &Path) -> Result<Registration, WatchError> {
        let mut targets = self.targets.lock();
        if targets.iter().any(|t| path.starts_with(t)) {
            return Ok(Registration::AlreadyWatched);
        }

        if !path.is_dir() {
            return Err(WatchError::Register {
                path: path.to_path_buf(),
                message: "not a directory".to_string(),
            });
        }

        self.watcher
            .lock()
            .watch(path, RecursiveMode::Recursive)
            .map_err(|e| WatchError::Register {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        targets.push(path.to_path_buf());
        Ok(Registration::Added)
    }

    fn recurses_automatically(&self) -> bool {
        true
    }
}

/// Send from a watcher callback. Returns false once the receiver is gone.
fn forward<T>(tx: &mpsc::Sender<T>, item: T) -> bool {
    if tokio::runtime::Handle::try_current().is_ok() {
        // Poll scans started by `watch()` run on the registering thread,
        // which may be a runtime worker where blocking is not allowed
        !matches!(tx.try_send(item), Err(mpsc::error::TrySendError::Closed(_)))
    } else {
        tx.blocking_send(item).is_ok()
    }
}

/// Convert a `notify` event into one [`FileEvent`] per path.
pub fn translate(event: notify::Event) -> Vec<FileEvent> {
    let op = match event.kind {
        EventKind::Create(_) => Op::Create,
        EventKind::Remove(_) => Op::Remove,
        EventKind::Modify(ModifyKind::Name(_)) => Op::Rename,
        _ => Op::Other,
    };
    let folder = matches!(event.kind, EventKind::Create(CreateKind::Folder));

    event
        .paths
        .into_iter()
        .map(|path| {
            let is_dir = folder || (op == Op::Create && path.is_dir());
            FileEvent { path, op, is_dir }
        })
        .collect()
}
