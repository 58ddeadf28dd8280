//! In-process codec: `image` for decoding, libwebp (via `webp`) for encoding.

use async_trait::async_trait;
use image::{DynamicImage, ImageReader};
use std::path::{Path, PathBuf};

use super::Codec;
use crate::error::ConvertError;

#[derive(Debug, Clone, Default)]
pub struct NativeCodec;

impl NativeCodec {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Codec for NativeCodec {
    fn name(&self) -> &str {
        "libwebp"
    }

    async fn encode(
        &self,
        source: &Path,
        destination: &Path,
        quality: u8,
    ) -> Result<(), ConvertError> {
        let source = source.to_path_buf();
        let destination = destination.to_path_buf();

        // Decoding and libwebp encoding are CPU-bound
        tokio::task::spawn_blocking(move || encode_file(&source, &destination, quality))
            .await
            .map_err(|e| ConvertError::Internal(format!("encode task failed: {e}")))?
    }
}

fn encode_file(source: &Path, destination: &Path, quality: u8) -> Result<(), ConvertError> {
    let img = ImageReader::open(source)
        .map_err(|e| ConvertError::decode(source, e))?
        .with_guessed_format()
        .map_err(|e| ConvertError::decode(source, e))?
        .decode()
        .map_err(|e| ConvertError::decode(source, e))?;

    let data = encode_webp(&img, quality).map_err(|message| ConvertError::Encode {
        path: PathBuf::from(destination),
        message,
    })?;

    std::fs::write(destination, &data).map_err(|e| ConvertError::Output {
        path: destination.to_path_buf(),
        source: e,
    })
}

/// Lossy-encode an image, returning the WebP bytes.
pub(crate) fn encode_webp(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, String> {
    // libwebp only accepts 8-bit RGB/RGBA input
    let converted;
    let img = match img {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => img,
        other => {
            converted = DynamicImage::ImageRgba8(other.to_rgba8());
            &converted
        }
    };

    let encoder = webp::Encoder::from_image(img).map_err(|e| e.to_string())?;

    // WebPMemory is !Send, copy it out before leaving the blocking task
    let memory = encoder
        .encode_simple(false, f32::from(quality))
        .map_err(|e| format!("{e:?}"))?;

    Ok(memory.to_vec())
}
