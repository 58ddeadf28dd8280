use clap::{Parser, Subcommand};
use std::path::PathBuf;
use webpify::config::CodecKind;

#[derive(Parser)]
#[command(name = "webpify")]
#[command(author, version, about = "Convert new images in a directory tree to WebP")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Watch a directory and convert new images until interrupted
    Watch {
        /// Directory to watch (overrides watch.root)
        #[arg(long)]
        root: Option<PathBuf>,

        /// Number of conversion workers (overrides conversion.workers)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Encoder to use: native or cwebp (overrides conversion.codec)
        #[arg(long)]
        codec: Option<CodecKind>,
    },

    /// Convert the given files, or supported images under the given directories
    Convert {
        /// Files or directories to convert
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Wait the configured settle delay before each file
        #[arg(long)]
        keep_settle: bool,
    },

    /// Check that the external encoder is available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        path: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
