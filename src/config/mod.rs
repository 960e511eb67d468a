mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    parse_config(&content).with_context(|| format!("Invalid config file: {:?}", path))
}

/// Parse and validate configuration text
pub fn parse_config(content: &str) -> Result<Config> {
    let mut config: Config = toml::from_str(content).context("Failed to parse config")?;

    validate_config(&config)?;

    config.cache.dir = config.cache.dir.as_deref().map(expand);
    config.tools.ffprobe_path = config.tools.ffprobe_path.as_deref().map(expand);

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = ["./frameseek.toml", "~/.config/frameseek/config.toml"];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    Ok(Config::default())
}

fn expand(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref())
}

/// Validate configuration
fn validate_config(config: &Config) -> Result<()> {
    config
        .engine
        .validate()
        .context("Invalid [engine] settings")?;

    if let Some(dir) = &config.cache.dir {
        if dir.as_os_str().is_empty() {
            anyhow::bail!("[cache] dir cannot be empty");
        }
    }

    if let Some(path) = &config.tools.ffprobe_path {
        if !expand(path).exists() {
            tracing::warn!("Configured ffprobe does not exist: {:?}", path);
        }
    }

    Ok(())
}
