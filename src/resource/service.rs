//! Service resource - enable and (re)start the supervised process

use anyhow::{Result, bail};

use super::{ApplyContext, ApplyResult, Resource, ResourceState};
use crate::runner;

/// The systemd service for the application. Applied last, never skipped:
/// the unit may have changed even when the service is already running.
#[derive(Debug, Clone)]
pub struct SystemdService {
    pub name: String,
}

impl SystemdService {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }

    fn is_active(&self) -> bool {
        runner::run_quiet("systemctl", &["is-active", "--quiet", &self.name])
    }

    fn converge(&self) -> Result<()> {
        runner::run_checked("systemctl", &["daemon-reload"])?;
        runner::run_checked("systemctl", &["enable", &self.name])?;

        let status = runner::run("systemctl", &["restart", &self.name])?;
        if !status.success() {
            bail!(
                "systemctl restart {} failed (exit {}); inspect with: journalctl -u {}",
                self.name,
                status,
                self.name
            );
        }
        Ok(())
    }
}

impl Resource for SystemdService {
    fn id(&self) -> String {
        format!("service:{}", self.name)
    }

    fn description(&self) -> String {
        format!("Enable and start {}", self.name)
    }

    fn resource_type(&self) -> &'static str {
        "systemd_service"
    }

    fn current_state(&self) -> Result<ResourceState> {
        if self.is_active() {
            Ok(ResourceState::Present {
                details: Some("active".to_string()),
            })
        } else {
            Ok(ResourceState::Absent)
        }
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present {
            details: Some("restarted".to_string()),
        }
    }

    fn needs_apply(&self) -> Result<bool> {
        // Always restarted: the unit contents changed this run (fresh secret)
        Ok(true)
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        if ctx.dry_run {
            return Ok(ApplyResult::Skipped {
                reason: "Dry run".to_string(),
            });
        }

        let was_active = self.is_active();
        self.converge()?;

        if was_active {
            Ok(ApplyResult::Modified)
        } else {
            Ok(ApplyResult::Created)
        }
    }
}
