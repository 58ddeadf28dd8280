//! Shared test harness for integration tests.
//!
//! Provides [`ScriptedProvider`], an in-memory watch provider that only reports
//! changes in directories that were explicitly registered, plus fake codecs and
//! helpers for fabricating real images and waiting on pipeline events.

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::{Rgb, RgbImage};
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};

use webpify::codec::Codec;
use webpify::error::{ConvertError, WatchError};
use webpify::events::{Event, EventPayload};
use webpify::watch::{FileEvent, ProviderStreams, Registration, WatchProvider};

/// Default wait for asynchronous pipeline events.
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// ScriptedProvider
// ---------------------------------------------------------------------------

/// Watch provider driven by the test.
///
/// Registration is per directory: `add_recursive` registers the directory and
/// the subdirectories that exist at that moment. Directories created later are
/// only observed once something registers them.
pub struct ScriptedProvider {
    watched: Mutex<HashSet<PathBuf>>,
    refused: Mutex<HashSet<PathBuf>>,
    registrations: Mutex<Vec<PathBuf>>,
    events: mpsc::Sender<FileEvent>,
    errors: mpsc::Sender<WatchError>,
}

impl ScriptedProvider {
    pub fn new() -> (Arc<Self>, ProviderStreams) {
        let (event_tx, event_rx) = mpsc::channel(64);
        let (error_tx, error_rx) = mpsc::channel(64);
        let provider = Arc::new(Self {
            watched: Mutex::new(HashSet::new()),
            refused: Mutex::new(HashSet::new()),
            registrations: Mutex::new(Vec::new()),
            events: event_tx,
            errors: error_tx,
        });
        (
            provider,
            ProviderStreams {
                events: event_rx,
                errors: error_rx,
            },
        )
    }

    pub fn registrations(&self) -> Vec<PathBuf> {
        self.registrations.lock().clone()
    }

    fn is_watched(&self, path: &Path) -> bool {
        path.parent()
            .map(|parent| self.watched.lock().contains(parent))
            .unwrap_or(false)
    }

    /// Write a file and report it if its directory is watched.
    pub async fn create_file(&self, path: &Path, contents: &[u8]) -> bool {
        std::fs::write(path, contents).unwrap();
        self.report(FileEvent::created_file(path)).await
    }

    /// Create a directory and report it if its parent is watched.
    pub async fn create_dir(&self, path: &Path) -> bool {
        std::fs::create_dir(path).unwrap();
        self.report(FileEvent::created_dir(path)).await
    }

    /// Report an event for a path that already exists on disk.
    pub async fn report(&self, event: FileEvent) -> bool {
        if !self.is_watched(&event.path) {
            return false;
        }
        self.events.send(event).await.is_ok()
    }

    /// Make future registrations of `path` fail.
    pub fn refuse(&self, path: &Path) {
        self.refused.lock().insert(path.to_path_buf());
    }

    /// Push an error onto the error stream.
    pub async fn fail(&self, error: WatchError) {
        self.errors.send(error).await.unwrap();
    }
}

impl WatchProvider for ScriptedProvider {
    fn add_recursive(&self, path: &Path) -> Result<Registration, WatchError> {
        if !path.is_dir() {
            return Err(WatchError::Register {
                path: path.to_path_buf(),
                message: "not a directory".into(),
            });
        }
        if self.refused.lock().contains(path) {
            return Err(WatchError::Register {
                path: path.to_path_buf(),
                message: "permission denied".into(),
            });
        }

        let mut watched = self.watched.lock();
        for entry in walkdir::WalkDir::new(path)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_dir())
        {
            watched.insert(entry.into_path());
        }
        self.registrations.lock().push(path.to_path_buf());
        Ok(Registration::Added)
    }
}

// ---------------------------------------------------------------------------
// Fake codecs
// ---------------------------------------------------------------------------

/// Writes a small placeholder output after a fixed delay and tracks how many
/// encodes run at the same time.
pub struct SlowCodec {
    pub delay: Duration,
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub calls: AtomicUsize,
}

impl SlowCodec {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Codec for SlowCodec {
    fn name(&self) -> &str {
        "slow"
    }

    async fn encode(
        &self,
        _source: &Path,
        destination: &Path,
        _quality: u8,
    ) -> Result<(), ConvertError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;
        let written = tokio::fs::write(destination, b"RIFF....WEBP").await;

        self.active.fetch_sub(1, Ordering::SeqCst);
        written.map_err(|e| ConvertError::Output {
            path: destination.to_path_buf(),
            source: e,
        })
    }
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

/// A small gradient image.
pub fn sample_image() -> RgbImage {
    RgbImage::from_fn(40, 30, |x, y| Rgb([(x * 6) as u8, (y * 8) as u8, 200]))
}

/// Encoded bytes of [`sample_image`] in the format implied by `ext`.
pub fn sample_image_bytes(ext: &str) -> Vec<u8> {
    let format = image::ImageFormat::from_extension(ext).expect("known image extension");
    let mut buf = std::io::Cursor::new(Vec::new());
    sample_image().write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

/// Write [`sample_image`] to `path` using the format implied by its extension.
pub fn write_sample_image(path: &Path) {
    sample_image().save(path).unwrap();
}

/// True if `path` holds a decodable WebP image.
pub fn is_valid_webp(path: &Path) -> bool {
    image::ImageReader::open(path)
        .ok()
        .and_then(|r| r.with_guessed_format().ok())
        .map(|r| r.format() == Some(image::ImageFormat::WebP) && r.decode().is_ok())
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Wait for the next event matching `pred`, skipping others.
pub async fn wait_for<F>(rx: &mut broadcast::Receiver<Event>, mut pred: F) -> EventPayload
where
    F: FnMut(&EventPayload) -> bool,
{
    tokio::time::timeout(EVENT_TIMEOUT, async {
        loop {
            match rx.recv().await {
                Ok(event) if pred(&event.payload) => return event.payload,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event bus closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for pipeline event")
}

/// Wait for the conversion outcome (success or failure) of `source`.
pub async fn wait_for_outcome(rx: &mut broadcast::Receiver<Event>, source: &Path) -> EventPayload {
    wait_for(rx, |payload| match payload {
        EventPayload::ConversionCompleted { source: s, .. }
        | EventPayload::ConversionFailed { source: s, .. } => s == source,
        _ => false,
    })
    .await
}
