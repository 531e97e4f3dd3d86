use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sigil_core::EngineConfig;

pub const CONFIG_FILE: &str = "sigil.toml";
pub const DB_FILE: &str = "sigils.db";

/// `$SIGIL_DATA_DIR`, else `~/.sigil-engine`.
pub fn data_dir() -> PathBuf {
    env::var("SIGIL_DATA_DIR")
        .ok()
        .map(PathBuf::from)
        .unwrap_or_else(|| home_dir().join(".sigil-engine"))
}

fn home_dir() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Load engine settings. An explicit path must exist; the data-dir default
/// file is optional.
pub fn load(explicit: Option<&Path>, data_dir: &Path) -> Result<EngineConfig> {
    let (path, required) = match explicit {
        Some(p) => (p.to_path_buf(), true),
        None => (data_dir.join(CONFIG_FILE), false),
    };

    if !required && !path.exists() {
        tracing::debug!("no config at {}, using defaults", path.display());
        return Ok(EngineConfig::default());
    }

    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config = parse(&text).with_context(|| format!("invalid config {}", path.display()))?;
    tracing::info!("loaded config from {}", path.display());
    Ok(config)
}

pub fn parse(text: &str) -> Result<EngineConfig> {
    let config: EngineConfig = toml::from_str(text)?;
    config.validate()?;
    Ok(config)
}
