use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

/// Get the config directory path (~/.config/skiff)
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("SKIFF_CONFIG_DIR") {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("skiff"))
}

/// Which on-disk format a config was loaded from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

/// Load a config by stem, trying `<stem>.toml` then `<stem>.json`
pub fn load_config<T: DeserializeOwned>(dir: &Path, stem: &str) -> Result<(T, ConfigFormat)> {
    let toml_path = dir.join(format!("{stem}.toml"));
    if toml_path.exists() {
        let content = fs::read_to_string(&toml_path)
            .with_context(|| format!("Could not read {}", toml_path.display()))?;
        let parsed = toml::from_str(&content)
            .with_context(|| format!("Invalid TOML in {}", toml_path.display()))?;
        return Ok((parsed, ConfigFormat::Toml));
    }

    let json_path = dir.join(format!("{stem}.json"));
    if json_path.exists() {
        let content = fs::read_to_string(&json_path)
            .with_context(|| format!("Could not read {}", json_path.display()))?;
        let parsed = serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON in {}", json_path.display()))?;
        return Ok((parsed, ConfigFormat::Json));
    }

    anyhow::bail!(
        "No config found: expected {} or {}",
        toml_path.display(),
        json_path.display()
    )
}
