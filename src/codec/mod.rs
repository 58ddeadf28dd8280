//! Image conversion.
//!
//! [`Converter`] is the single "convert file at path" operation used by the
//! workers and the `convert` command. It owns the settle delay, output path
//! derivation and removal of the original. The actual decode/encode step is
//! delegated to a [`Codec`]:
//!
//! - [`NativeCodec`]: in-process decode with `image`, lossy encode with libwebp
//! - [`CwebpCodec`]: spawns the `cwebp` executable
//!
//! Both strategies behave identically from the caller's side: the original is
//! only removed after the WebP file has been written successfully, and a failed
//! removal does not turn a successful conversion into a failure.

mod cwebp;
mod native;

pub use cwebp::CwebpCodec;
pub use native::NativeCodec;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::{CodecKind, Config};
use crate::error::ConvertError;

/// Extension written by every codec.
pub const OUTPUT_EXTENSION: &str = "webp";

/// Decode a source image and write it as WebP.
#[async_trait]
pub trait Codec: Send + Sync {
    /// Short name used in log output.
    fn name(&self) -> &str;

    /// Convert `source` into `destination` at the given lossy quality.
    ///
    /// Must not touch `source`. A partially written `destination` may be left
    /// behind on failure.
    async fn encode(
        &self,
        source: &Path,
        destination: &Path,
        quality: u8,
    ) -> Result<(), ConvertError>;
}

/// Derive the WebP path for a source: same directory and stem, `.webp` extension.
///
/// A bare dotfile such as `.png` has an empty stem and becomes `.webp`.
pub fn output_path(source: &Path) -> PathBuf {
    let dotfile = source.extension().is_none()
        && source
            .file_name()
            .is_some_and(|name| name.to_string_lossy().starts_with('.'));

    if dotfile {
        source.with_file_name(format!(".{OUTPUT_EXTENSION}"))
    } else {
        source.with_extension(OUTPUT_EXTENSION)
    }
}

/// A successful conversion.
#[derive(Debug)]
pub struct Converted {
    /// The WebP file that was written.
    pub output: PathBuf,
    /// Time spent after the settle delay.
    pub elapsed: Duration,
    /// Set when the original could not be removed.
    pub delete_error: Option<ConvertError>,
}

/// A failed conversion. The source file is left in place.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct ConversionFailure {
    /// Time spent after the settle delay.
    pub elapsed: Duration,
    #[source]
    pub error: ConvertError,
}

/// Runs one conversion end to end.
pub struct Converter {
    codec: Arc<dyn Codec>,
    settle_delay: Duration,
    quality: u8,
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("codec", &self.codec.name())
            .field("settle_delay", &self.settle_delay)
            .field("quality", &self.quality)
            .finish()
    }
}

impl Converter {
    pub fn new(codec: Arc<dyn Codec>, settle_delay: Duration, quality: u8) -> Self {
        Self {
            codec,
            settle_delay,
            quality: quality.min(100),
        }
    }

    /// Build a converter with the codec selected in the configuration.
    pub fn from_config(config: &Config) -> Result<Self, ConvertError> {
        let codec: Arc<dyn Codec> = match config.conversion.codec {
            CodecKind::Native => Arc::new(NativeCodec::new()),
            CodecKind::Cwebp => {
                Arc::new(CwebpCodec::locate(config.tools.cwebp_path.as_deref())?)
            }
        };

        Ok(Self::new(
            codec,
            config.conversion.settle_delay(),
            config.conversion.quality,
        ))
    }

    /// Same codec and quality, different settle delay.
    pub fn with_settle_delay(&self, settle_delay: Duration) -> Self {
        Self {
            codec: Arc::clone(&self.codec),
            settle_delay,
            quality: self.quality,
        }
    }

    pub fn codec_name(&self) -> &str {
        self.codec.name()
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Wait for the file to settle, encode it next to the original as WebP,
    /// then remove the original.
    pub async fn convert(&self, source: &Path) -> Result<Converted, ConversionFailure> {
        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }
        let start = Instant::now();

        let output = output_path(source);
        tracing::debug!(
            "Encoding {:?} -> {:?} with {} (quality {})",
            source,
            output,
            self.codec.name(),
            self.quality
        );

        if let Err(error) = self.codec.encode(source, &output, self.quality).await {
            return Err(ConversionFailure {
                elapsed: start.elapsed(),
                error,
            });
        }

        let delete_error = tokio::fs::remove_file(source)
            .await
            .err()
            .map(|e| ConvertError::Delete {
                path: source.to_path_buf(),
                source: e,
            });

        Ok(Converted {
            output,
            elapsed: start.elapsed(),
            delete_error,
        })
    }
}
