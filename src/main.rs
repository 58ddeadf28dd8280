mod cli;

use webpify::{
    app,
    codec::{CwebpCodec, Converter},
    config,
    formats::FormatFilter,
    pool::relative_to,
};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::path::{Path, PathBuf};
use std::time::Duration;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "webpify=trace,notify=debug".to_string()
        } else {
            "webpify=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Watch {
            root,
            workers,
            codec,
        } => {
            let mut config = config::load_config_or_default(cli.config.as_deref())?;

            // Override config from CLI if specified
            if let Some(root) = root {
                config.watch.root = Some(root);
            }
            if let Some(workers) = workers {
                config.conversion.workers = workers;
            }
            if let Some(codec) = codec {
                config.conversion.codec = codec;
            }
            config::validate_config(&config)?;

            let Some(root) = config.watch.root.clone() else {
                anyhow::bail!("No watch root configured; set watch.root or pass --root");
            };

            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(app::run(&config, &root))
        }
        Commands::Convert { paths, keep_settle } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(convert_paths(&config, &paths, keep_settle))
        }
        Commands::CheckTools => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(check_tools(&config))
        }
        Commands::Validate { path } => {
            let path = path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("webpify {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn convert_paths(
    config: &config::Config,
    paths: &[PathBuf],
    keep_settle: bool,
) -> Result<()> {
    let converter = Converter::from_config(config)?;
    let converter = if keep_settle {
        converter
    } else {
        converter.with_settle_delay(Duration::ZERO)
    };

    let filter = config.watch.format_filter();
    let files = collect_files(paths, &filter);
    if files.is_empty() {
        println!("No supported images found.");
        return Ok(());
    }

    let mut failed = 0usize;
    for file in &files {
        let base = file.parent().unwrap_or(Path::new(""));
        match converter.convert(file).await {
            Ok(converted) => {
                if let Some(err) = &converted.delete_error {
                    tracing::warn!("{}", err);
                }
                println!(
                    "Converted {} to {} in {:.1} seconds",
                    file.display(),
                    relative_to(base, &converted.output).display(),
                    converted.elapsed.as_secs_f64()
                );
            }
            Err(failure) => {
                failed += 1;
                eprintln!("Failed to convert {}: {}", file.display(), failure);
            }
        }
    }

    println!("\n{} converted, {} failed", files.len() - failed, failed);
    if failed > 0 {
        anyhow::bail!("{} of {} conversions failed", failed, files.len());
    }

    Ok(())
}

/// Expand directories into the supported images below them.
fn collect_files(paths: &[PathBuf], filter: &FormatFilter) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_dir() {
            for entry in walkdir::WalkDir::new(path)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                if filter.matches(entry.path()) {
                    files.push(entry.into_path());
                }
            }
        } else if filter.matches(path) {
            files.push(path.clone());
        } else {
            eprintln!("Skipping unsupported file: {}", path.display());
        }
    }

    files
}

async fn check_tools(config: &config::Config) -> Result<()> {
    println!("Checking external tools...\n");

    match CwebpCodec::locate(config.tools.cwebp_path.as_deref()) {
        Ok(codec) => {
            print!("✓ cwebp");
            if let Some(version) = codec.version().await {
                print!(" ({})", version);
            }
            println!(" - {}", codec.program().display());
            println!("\nThe cwebp codec is available.");
        }
        Err(e) => {
            println!("✗ cwebp - {}", e);
            println!("\nInstall libwebp tools to use codec = \"cwebp\"; the native codec needs nothing extra.");
        }
    }

    Ok(())
}

fn validate_config(path: Option<&std::path::Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!("  Watch root: {:?}", config.watch.root);
            println!(
                "  Backend: {:?} (poll interval {}s)",
                config.watch.backend, config.watch.poll_interval_secs
            );
            println!("  Extensions: {}", config.watch.extensions.join(", "));
            println!(
                "  Workers: {} (queue capacity {})",
                config.conversion.workers, config.conversion.queue_capacity
            );
            println!(
                "  Codec: {:?} at quality {}",
                config.conversion.codec, config.conversion.quality
            );
            println!("  Settle delay: {}ms", config.conversion.settle_delay_ms);
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!(
                "  Workers: {}, quality {}",
                config.conversion.workers, config.conversion.quality
            );
        }
    }

    Ok(())
}
