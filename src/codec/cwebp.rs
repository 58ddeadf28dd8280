//! Subprocess codec driving the `cwebp` command-line encoder.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use super::Codec;
use crate::error::ConvertError;

const TOOL_NAME: &str = "cwebp";

/// Encodes by spawning `cwebp -mt -q <quality> <input> -o <output>`.
///
/// There is no timeout: a hung encoder occupies its worker until it exits.
#[derive(Debug, Clone)]
pub struct CwebpCodec {
    program: PathBuf,
}

impl CwebpCodec {
    /// Use an explicit executable path.
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }

    /// Use the configured path if given, otherwise look `cwebp` up in `PATH`.
    pub fn locate(configured: Option<&Path>) -> Result<Self, ConvertError> {
        match configured {
            Some(path) if path.exists() => Ok(Self::new(path.to_path_buf())),
            Some(path) => Err(ConvertError::ToolNotFound(path.display().to_string())),
            None => which::which(TOOL_NAME)
                .map(Self::new)
                .map_err(|_| ConvertError::ToolNotFound(TOOL_NAME.to_string())),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments for one conversion.
    fn args(source: &Path, destination: &Path, quality: u8) -> Vec<String> {
        vec![
            "-mt".to_string(),
            "-quiet".to_string(),
            "-q".to_string(),
            quality.to_string(),
            source.to_string_lossy().to_string(),
            "-o".to_string(),
            destination.to_string_lossy().to_string(),
        ]
    }

    /// First line of `cwebp -version`, if the tool runs.
    pub async fn version(&self) -> Option<String> {
        let output = Command::new(&self.program)
            .arg("-version")
            .output()
            .await
            .ok()?;

        if !output.status.success() {
            return None;
        }

        String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .map(|l| l.trim().to_string())
    }
}

#[async_trait]
impl Codec for CwebpCodec {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    async fn encode(
        &self,
        source: &Path,
        destination: &Path,
        quality: u8,
    ) -> Result<(), ConvertError> {
        let args = Self::args(source, destination, quality);
        tracing::debug!("cwebp args: {:?}", args);

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .await
            .map_err(|e| ConvertError::tool(TOOL_NAME, format!("failed to spawn: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ConvertError::tool(
                TOOL_NAME,
                format!(
                    "exited with status {:?}: {}",
                    output.status.code(),
                    stderr.trim()
                ),
            ));
        }

        Ok(())
    }
}
