//! Virtualenv resource - isolated dependency environment
//!
//! Install mode is decided by the presence of the local package cache
//! directory: when it exists, dependencies resolve offline via
//! `--no-index --find-links`, never contacting a remote index. There is no
//! override flag.

use anyhow::{Context, Result, bail};
use std::fs;
use std::path::{Path, PathBuf};

use super::{ApplyContext, ApplyResult, Resource, ResourceState};
use crate::runner;

/// How pip resolves dependencies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallMode {
    /// Resolve against the internet package index
    Online,
    /// Resolve exclusively from a pre-staged local package cache
    Offline,
}

impl InstallMode {
    /// Cache presence unconditionally selects offline mode
    pub fn select(package_cache: &Path) -> Self {
        if package_cache.is_dir() {
            Self::Offline
        } else {
            Self::Online
        }
    }
}

/// The application's virtualenv plus installed requirements
#[derive(Debug, Clone)]
pub struct Virtualenv {
    pub venv_dir: PathBuf,
    pub requirements: PathBuf,
    pub package_cache: PathBuf,
}

impl Virtualenv {
    pub fn new(venv_dir: PathBuf, requirements: PathBuf, package_cache: PathBuf) -> Self {
        Self {
            venv_dir,
            requirements,
            package_cache,
        }
    }

    pub fn mode(&self) -> InstallMode {
        InstallMode::select(&self.package_cache)
    }

    fn python(&self) -> PathBuf {
        self.venv_dir.join("bin").join("python")
    }

    /// Stamp file recording the hash of the last-installed requirements
    fn stamp_path(&self) -> PathBuf {
        self.venv_dir.join(".skiff-requirements.b3")
    }

    fn requirements_hash(&self) -> Result<String> {
        let content = fs::read(&self.requirements)
            .with_context(|| format!("Could not read {}", self.requirements.display()))?;
        Ok(blake3::hash(&content).to_hex().to_string())
    }

    /// pip arguments for the selected mode
    pub fn pip_args(&self) -> Vec<String> {
        let mut args = vec!["-m".to_string(), "pip".to_string(), "install".to_string()];
        if self.mode() == InstallMode::Offline {
            args.push("--no-index".to_string());
            args.push("--find-links".to_string());
            args.push(self.package_cache.to_string_lossy().to_string());
        }
        args.push("-r".to_string());
        args.push(self.requirements.to_string_lossy().to_string());
        args
    }

    fn build_venv(&self) -> Result<()> {
        let venv = self.venv_dir.to_string_lossy().to_string();
        let status = runner::run("python3", &["-m", "venv", &venv])?;
        if !status.success() {
            bail!("python3 -m venv failed (exit {})", status);
        }
        Ok(())
    }

    fn install_requirements(&self) -> Result<()> {
        let python = self.python().to_string_lossy().to_string();
        let args = self.pip_args();
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();

        log::info!("pip install mode: {:?}", self.mode());
        let status = runner::run(&python, &arg_refs)?;
        if !status.success() {
            bail!("pip install failed (exit {})", status);
        }

        fs::write(self.stamp_path(), self.requirements_hash()?)
            .context("Could not write requirements stamp")?;
        Ok(())
    }
}

impl Resource for Virtualenv {
    fn id(&self) -> String {
        format!("venv:{}", self.venv_dir.display())
    }

    fn description(&self) -> String {
        match self.mode() {
            InstallMode::Online => {
                format!("Virtualenv {} (online install)", self.venv_dir.display())
            }
            InstallMode::Offline => format!(
                "Virtualenv {} (offline, cache {})",
                self.venv_dir.display(),
                self.package_cache.display()
            ),
        }
    }

    fn resource_type(&self) -> &'static str {
        "virtualenv"
    }

    fn current_state(&self) -> Result<ResourceState> {
        if !self.python().exists() {
            return Ok(ResourceState::Absent);
        }

        let stamped = fs::read_to_string(self.stamp_path()).unwrap_or_default();
        let wanted = self.requirements_hash()?;
        if stamped.trim() == wanted {
            Ok(ResourceState::Present { details: None })
        } else {
            Ok(ResourceState::Modified {
                from: "stale requirements".to_string(),
                to: "current requirements".to_string(),
            })
        }
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present { details: None }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        if ctx.dry_run {
            return Ok(ApplyResult::Skipped {
                reason: "Dry run".to_string(),
            });
        }

        let state = self.current_state()?;
        if state == self.desired_state() {
            return Ok(ApplyResult::NoChange);
        }

        let created = state == ResourceState::Absent;
        if created {
            self.build_venv()?;
        }
        self.install_requirements()?;

        if created {
            Ok(ApplyResult::Created)
        } else {
            Ok(ApplyResult::Modified)
        }
    }
}
