use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::formats::{FormatFilter, DEFAULT_EXTENSIONS};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub watch: WatchConfig,

    #[serde(default)]
    pub conversion: ConversionConfig,

    #[serde(default)]
    pub tools: ToolsConfig,
}

/// Which `notify` backend drives the watcher.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WatchBackend {
    /// Platform-native notifications (inotify, FSEvents, ...).
    Native,
    /// Periodic directory scans at `poll_interval_secs`.
    #[default]
    Poll,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WatchConfig {
    /// Root directory to watch recursively
    #[serde(default)]
    pub root: Option<PathBuf>,

    #[serde(default)]
    pub backend: WatchBackend,

    /// Scan interval for the poll backend (default: 2)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Source extensions to convert (default: jpg, jpeg, png)
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

fn default_poll_interval() -> u64 {
    2
}

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            root: None,
            backend: WatchBackend::default(),
            poll_interval_secs: default_poll_interval(),
            extensions: default_extensions(),
        }
    }
}

impl WatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn format_filter(&self) -> FormatFilter {
        FormatFilter::new(&self.extensions)
    }
}

/// Encoder strategy used by the conversion workers.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    /// In-process decode with `image`, encode with libwebp.
    #[default]
    Native,
    /// Spawn the `cwebp` executable.
    Cwebp,
}

impl std::str::FromStr for CodecKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "native" | "libwebp" => Ok(Self::Native),
            "cwebp" => Ok(Self::Cwebp),
            _ => Err(format!("Unknown codec: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConversionConfig {
    /// Number of concurrent conversion workers (default: 2)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Capacity of the job queue between watcher and workers (default: 10)
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Pause before touching a new file so writers can finish (default: 1000)
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,

    /// Lossy WebP quality, 0-100 (default: 80)
    #[serde(default = "default_quality")]
    pub quality: u8,

    #[serde(default)]
    pub codec: CodecKind,

    /// Finish queued jobs before exiting on shutdown (default: true)
    #[serde(default = "default_drain_on_shutdown")]
    pub drain_on_shutdown: bool,
}

fn default_workers() -> usize {
    2
}

fn default_queue_capacity() -> usize {
    10
}

fn default_settle_delay() -> u64 {
    1000
}

fn default_quality() -> u8 {
    80
}

fn default_drain_on_shutdown() -> bool {
    true
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            settle_delay_ms: default_settle_delay(),
            quality: default_quality(),
            codec: CodecKind::default(),
            drain_on_shutdown: default_drain_on_shutdown(),
        }
    }
}

impl ConversionConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub cwebp_path: Option<PathBuf>,
}
