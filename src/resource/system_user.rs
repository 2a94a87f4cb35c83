//! System user resource - the dedicated low-privilege execution identity

use anyhow::{Result, bail};

use super::{ApplyContext, ApplyResult, Resource, ResourceState};
use crate::runner;

/// A system user the service runs as. Created once, never modified.
#[derive(Debug, Clone)]
pub struct SystemUser {
    pub name: String,
    pub home: String,
}

impl SystemUser {
    pub fn new(name: &str, home: &str) -> Self {
        Self {
            name: name.to_string(),
            home: home.to_string(),
        }
    }

    fn exists(&self) -> bool {
        runner::run_quiet("id", &["-u", &self.name])
    }

    fn create(&self) -> Result<()> {
        let status = runner::run(
            "useradd",
            &[
                "--system",
                "--shell",
                "/usr/sbin/nologin",
                "--home-dir",
                &self.home,
                "--no-create-home",
                &self.name,
            ],
        )?;
        if !status.success() {
            bail!("useradd {} failed (exit {})", self.name, status);
        }
        Ok(())
    }
}

impl Resource for SystemUser {
    fn id(&self) -> String {
        format!("user:{}", self.name)
    }

    fn description(&self) -> String {
        format!("Create system user {}", self.name)
    }

    fn resource_type(&self) -> &'static str {
        "system_user"
    }

    fn current_state(&self) -> Result<ResourceState> {
        if self.exists() {
            Ok(ResourceState::Present { details: None })
        } else {
            Ok(ResourceState::Absent)
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

        if self.exists() {
            return Ok(ApplyResult::NoChange);
        }

        self.create()?;
        Ok(ApplyResult::Created)
    }
}
