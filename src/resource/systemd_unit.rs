//! Supervisor unit resource
//!
//! The unit embeds the generated runtime secret, which is fresh on every
//! provisioning run. Once a unit exists on disk this resource therefore
//! always diffs as Modified: that is the (documented) rotation-on-rerun
//! behavior of the original provisioner, preserved and made visible.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use super::{ApplyContext, ApplyResult, Resource, ResourceState};

/// Everything needed to render a service unit
#[derive(Debug, Clone)]
pub struct UnitSpec {
    pub service_name: String,
    pub app_dir: String,
    pub run_user: String,
    pub exec_start: String,
    pub restart: String,
    /// Environment variables, already including the generated secret
    pub env: Vec<(String, String)>,
}

impl UnitSpec {
    /// Render the unit file body
    pub fn render(&self) -> String {
        let mut unit = String::new();
        unit.push_str("[Unit]\n");
        unit.push_str(&format!("Description={} service\n", self.service_name));
        unit.push_str("After=network.target\n\n");

        unit.push_str("[Service]\n");
        unit.push_str("Type=simple\n");
        unit.push_str(&format!("User={}\n", self.run_user));
        unit.push_str(&format!("WorkingDirectory={}\n", self.app_dir));
        for (key, value) in &self.env {
            unit.push_str(&format!("Environment=\"{key}={value}\"\n"));
        }
        unit.push_str(&format!("ExecStart={}\n", self.exec_path()));
        unit.push_str(&format!("Restart={}\n", self.restart));
        unit.push_str("RestartSec=5\n\n");

        unit.push_str("[Install]\n");
        unit.push_str("WantedBy=multi-user.target\n");
        unit
    }

    /// ExecStart must be absolute; relative commands are rooted at the app dir
    fn exec_path(&self) -> String {
        if self.exec_start.starts_with('/') {
            self.exec_start.clone()
        } else {
            format!("{}/{}", self.app_dir.trim_end_matches('/'), self.exec_start)
        }
    }
}

/// A systemd unit file on disk
#[derive(Debug, Clone)]
pub struct SystemdUnit {
    pub path: PathBuf,
    pub contents: String,
}

impl SystemdUnit {
    pub fn new(path: PathBuf, spec: &UnitSpec) -> Self {
        Self {
            path,
            contents: spec.render(),
        }
    }
}

impl Resource for SystemdUnit {
    fn id(&self) -> String {
        format!("unit:{}", self.path.display())
    }

    fn description(&self) -> String {
        format!("Write supervisor unit {}", self.path.display())
    }

    fn resource_type(&self) -> &'static str {
        "systemd_unit"
    }

    fn current_state(&self) -> Result<ResourceState> {
        if !self.path.exists() {
            return Ok(ResourceState::Absent);
        }
        // The rendered contents carry a fresh secret, so an existing unit is
        // always Modified relative to this run.
        Ok(ResourceState::Modified {
            from: "existing unit".to_string(),
            to: "unit with rotated secret".to_string(),
        })
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present { details: None }
    }

    fn needs_apply(&self) -> Result<bool> {
        Ok(true)
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        if ctx.dry_run {
            return Ok(ApplyResult::Skipped {
                reason: "Dry run".to_string(),
            });
        }

        let existed = self.path.exists();
        fs::write(&self.path, &self.contents)
            .with_context(|| format!("Could not write {}", self.path.display()))?;

        if existed {
            Ok(ApplyResult::Modified)
        } else {
            Ok(ApplyResult::Created)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secret;

    fn spec_with_secret(secret: &str) -> UnitSpec {
        UnitSpec {
            service_name: "chat".into(),
            app_dir: "/opt/chat".into(),
            run_user: "chat".into(),
            exec_start: ".venv/bin/python app.py".into(),
            restart: "always".into(),
            env: vec![
                ("CHAT_DB_PATH".into(), "/opt/chat/data/chat.db".into()),
                ("CHAT_JWT_SECRET".into(), secret.into()),
            ],
        }
    }

    #[test]
    fn render_includes_environment_and_exec() {
        let unit = spec_with_secret("deadbeef").render();
        assert!(unit.contains("User=chat"));
        assert!(unit.contains("WorkingDirectory=/opt/chat"));
        assert!(unit.contains("Environment=\"CHAT_DB_PATH=/opt/chat/data/chat.db\""));
        assert!(unit.contains("Environment=\"CHAT_JWT_SECRET=deadbeef\""));
        assert!(unit.contains("ExecStart=/opt/chat/.venv/bin/python app.py"));
        assert!(unit.contains("Restart=always"));
        assert!(unit.contains("WantedBy=multi-user.target"));
    }

    #[test]
    fn absolute_exec_start_is_left_alone() {
        let mut spec = spec_with_secret("s");
        spec.exec_start = "/usr/bin/python3 app.py".into();
        assert!(spec.render().contains("ExecStart=/usr/bin/python3 app.py"));
    }

    #[test]
    fn two_provisioning_runs_render_different_units() {
        // Re-running the provisioner rotates the secret, so the two
        // resulting unit files always differ.
        let first = spec_with_secret(&secret::generate()).render();
        let second = spec_with_secret(&secret::generate()).render();
        assert_ne!(first, second);
    }

    #[test]
    fn existing_unit_always_diffs_as_modified() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.service");
        let spec = spec_with_secret("s");
        fs::write(&path, spec.render()).unwrap();

        let resource = SystemdUnit::new(path, &spec);
        assert!(matches!(
            resource.current_state().unwrap(),
            ResourceState::Modified { .. }
        ));
        assert!(resource.needs_apply().unwrap());
    }
}
