//! Error types for the conversion pipeline.
//!
//! Library code returns these typed errors; the binary wraps them in
//! `anyhow` with context at the application boundary.

use std::path::PathBuf;

/// Failure while converting a single image.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// The source could not be opened or decoded.
    #[error("Decode error for {}: {message}", path.display())]
    Decode {
        /// Source file path.
        path: PathBuf,
        /// Human-readable error description.
        message: String,
    },

    /// The decoded image could not be encoded to WebP.
    #[error("WebP encoding error for {}: {message}", path.display())]
    Encode {
        /// Destination file path.
        path: PathBuf,
        /// Human-readable error description.
        message: String,
    },

    /// Writing the destination file failed.
    #[error("Create output error for {}: {source}", path.display())]
    Output {
        /// Destination file path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// An external encoder exited unsuccessfully or could not be spawned.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// A required external tool is not installed.
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// The original file could not be removed after a successful encode.
    #[error("Failed to delete original file {}: {source}", path.display())]
    Delete {
        /// Source file path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A blocking codec task panicked or was cancelled.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConvertError {
    pub(crate) fn decode(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Decode {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

/// Failure reported by or while talking to the filesystem watcher.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WatchError {
    /// The underlying watcher could not be created.
    #[error("Failed to create file watcher: {0}")]
    Init(String),

    /// A directory could not be registered for watching.
    #[error("Failed to watch {}: {message}", path.display())]
    Register {
        /// Directory that was being registered.
        path: PathBuf,
        /// Human-readable error description.
        message: String,
    },

    /// An error surfaced by the watcher while it was running.
    #[error("Watcher error: {0}")]
    Provider(String),
}
