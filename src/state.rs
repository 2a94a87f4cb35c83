#![allow(dead_code)]

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

// ============================================================================
// State Structures
// ============================================================================

/// Operator-side record of what skiff last did to the target
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct SkiffState {
    /// Record of the last deploy, if any
    #[serde(default)]
    pub deploy: Option<DeployRecord>,

    /// Record of the last provisioning run, if any
    #[serde(default)]
    pub provision: Option<ProvisionRecord>,
}

/// What the last deploy shipped and how verification went
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DeployRecord {
    pub at: DateTime<Utc>,
    pub host: String,
    /// Short hash of the commit that was deployed
    pub commit: Option<String>,
    pub files_synced: usize,
    /// Whether the post-restart check saw the service active
    pub verified: bool,
}

/// When the target was last provisioned
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProvisionRecord {
    pub at: DateTime<Utc>,
    pub host: String,
    pub resources_applied: usize,
    /// The secret is rotated on every run; record that it happened
    pub secret_rotated: bool,
}

// ============================================================================
// SkiffState Implementation
// ============================================================================

impl SkiffState {
    /// Get the state directory path (~/.local/state/skiff)
    pub fn state_dir() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var("SKIFF_STATE_DIR") {
            return Ok(PathBuf::from(dir));
        }
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".local").join("state").join("skiff"))
    }

    fn state_file() -> Result<PathBuf> {
        Ok(Self::state_dir()?.join("state.toml"))
    }

    /// Load state from disk, or return default if file doesn't exist
    pub fn load() -> Result<Self> {
        let path = Self::state_file()?;

        if !path.exists() {
            log::debug!("State file does not exist, using default state");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;

        let state: SkiffState = toml::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

        log::debug!("Loaded state from {}", path.display());
        Ok(state)
    }

    /// Save state to disk
    pub fn save(&self) -> Result<()> {
        let dir = Self::state_dir()?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;

        let path = Self::state_file()?;
        let content = toml::to_string_pretty(&self).context("Failed to serialize state to TOML")?;

        fs::write(&path, &content)
            .with_context(|| format!("Failed to write state file: {}", path.display()))?;

        log::debug!("Saved state to {}", path.display());
        Ok(())
    }

    /// Record a completed deploy
    pub fn record_deploy(
        &mut self,
        host: &str,
        commit: Option<String>,
        files_synced: usize,
        verified: bool,
    ) {
        self.deploy = Some(DeployRecord {
            at: Utc::now(),
            host: host.to_string(),
            commit,
            files_synced,
            verified,
        });
    }

    /// Record a completed provisioning run
    pub fn record_provision(&mut self, host: &str, resources_applied: usize) {
        self.provision = Some(ProvisionRecord {
            at: Utc::now(),
            host: host.to_string(),
            resources_applied,
            secret_rotated: true,
        });
    }
}

// ============================================================================
// Tests
// ============================================================================
