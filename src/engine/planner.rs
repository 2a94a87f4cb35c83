//! Plan construction for both drivers

use anyhow::Result;
use std::path::Path;

use crate::remote;
use crate::resource::Resource;
use crate::schema::{Artifact, SkiffConfig};

/// A deploy plan: the expanded deployment descriptor plus the remote command
/// sequences derived from it. Built once at plan time; nothing is discovered
/// during execution.
#[derive(Debug)]
pub struct DeployPlan {
    pub artifacts: Vec<Artifact>,
    pub staging_dir: String,
    pub app_dir: String,
    pub service: String,
    pub run_user: String,
    /// Extra remote commands between the move and the restart
    pub post_copy: Vec<String>,
}

impl DeployPlan {
    /// Expand the manifest against the project root
    pub fn from_config(config: &SkiffConfig, root: &Path) -> Result<Self> {
        let artifacts = config.manifest.expand(root)?;
        Ok(Self {
            artifacts,
            staging_dir: config.manifest.staging_dir.clone(),
            app_dir: config.target.app_dir.clone(),
            service: config.target.service.clone(),
            run_user: config.service.run_user.clone(),
            post_copy: config.manifest.post_copy.clone(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Remote commands that prepare the staging directory
    pub fn prepare_script(&self) -> Vec<String> {
        vec![
            format!("rm -rf {}", self.staging_dir),
            format!("mkdir -p {}", self.staging_dir),
        ]
    }

    /// Remote commands that move staged files into the live directory,
    /// fix ownership, and clean up. Post-copy actions run at the end.
    pub fn promote_script(&self) -> Vec<String> {
        let mut script = vec![
            format!("sudo mkdir -p {}", self.app_dir),
            format!("sudo cp -r {}/. {}/", self.staging_dir, self.app_dir),
            format!("sudo chown -R {}: {}", self.run_user, self.app_dir),
            format!("rm -rf {}", self.staging_dir),
        ];
        script.extend(self.post_copy.iter().cloned());
        script
    }

    /// Remote command that restarts the supervised process
    pub fn restart_script(&self) -> Vec<String> {
        vec![format!("sudo systemctl restart {}", self.service)]
    }

    /// Quote-safe display of what ships
    pub fn describe_artifacts(&self) -> Vec<String> {
        self.artifacts
            .iter()
            .map(|a| format!("{} -> {}/{}", remote::shell_quote(&a.source), self.app_dir, a.target))
            .collect()
    }
}

/// An ordered provisioning plan. Order matters (packages before the venv,
/// the unit before the service) and resources apply strictly sequentially.
#[derive(Default)]
pub struct ProvisionPlan {
    pub resources: Vec<Box<dyn Resource>>,
}

impl ProvisionPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, resource: Box<dyn Resource>) {
        self.resources.push(resource);
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}
