mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config = parse_config(&content)
        .with_context(|| format!("Failed to load config file: {:?}", path))?;

    Ok(config)
}

/// Parse and validate configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).context("Failed to parse config")?;
    validate_config(&config)?;
    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./webpify.toml",
        "~/.config/webpify/config.toml",
        "/etc/webpify/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.conversion.workers == 0 {
        anyhow::bail!("conversion.workers must be at least 1");
    }

    if config.conversion.queue_capacity == 0 {
        anyhow::bail!("conversion.queue_capacity must be at least 1");
    }

    if config.conversion.quality > 100 {
        anyhow::bail!(
            "conversion.quality must be between 0 and 100, got {}",
            config.conversion.quality
        );
    }

    if config.watch.backend == WatchBackend::Poll && config.watch.poll_interval_secs == 0 {
        anyhow::bail!("watch.poll_interval_secs cannot be 0 with the poll backend");
    }

    if config.watch.format_filter().extensions().is_empty() {
        anyhow::bail!("watch.extensions cannot be empty");
    }

    if let Some(root) = &config.watch.root {
        if !root.exists() {
            tracing::warn!("Watch root does not exist: {:?}", root);
        }
    }

    Ok(())
}
