//! Directory resource - application and credentials directories

use anyhow::{Context, Result, bail};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use super::{ApplyContext, ApplyResult, Resource, ResourceState};
use crate::runner;

/// A directory with an owner and mode
#[derive(Debug, Clone)]
pub struct Directory {
    pub path: PathBuf,
    pub owner: Option<String>,
    pub mode: Option<u32>,
}

impl Directory {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            owner: None,
            mode: None,
        }
    }

    pub fn owned_by(mut self, owner: &str) -> Self {
        self.owner = Some(owner.to_string());
        self
    }

    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }

    fn current_mode(&self) -> Option<u32> {
        fs::metadata(&self.path)
            .ok()
            .map(|m| m.permissions().mode() & 0o7777)
    }

    fn converge(&self) -> Result<()> {
        fs::create_dir_all(&self.path)
            .with_context(|| format!("Could not create {}", self.path.display()))?;

        if let Some(mode) = self.mode {
            fs::set_permissions(&self.path, fs::Permissions::from_mode(mode))
                .with_context(|| format!("Could not chmod {}", self.path.display()))?;
        }

        if let Some(owner) = &self.owner {
            let spec = format!("{owner}:");
            let path = self.path.to_string_lossy().to_string();
            let status = runner::run("chown", &["-R", &spec, &path])?;
            if !status.success() {
                bail!("chown {} failed (exit {})", self.path.display(), status);
            }
        }

        Ok(())
    }
}

impl Resource for Directory {
    fn id(&self) -> String {
        format!("dir:{}", self.path.display())
    }

    fn description(&self) -> String {
        match (&self.owner, self.mode) {
            (Some(owner), Some(mode)) => format!(
                "Directory {} (owner {}, mode {:o})",
                self.path.display(),
                owner,
                mode
            ),
            (Some(owner), None) => format!("Directory {} (owner {})", self.path.display(), owner),
            _ => format!("Directory {}", self.path.display()),
        }
    }

    fn resource_type(&self) -> &'static str {
        "directory"
    }

    fn current_state(&self) -> Result<ResourceState> {
        if !self.path.is_dir() {
            return Ok(ResourceState::Absent);
        }
        if let Some(want) = self.mode {
            if let Some(have) = self.current_mode() {
                if have != want {
                    return Ok(ResourceState::Modified {
                        from: format!("mode {have:o}"),
                        to: format!("mode {want:o}"),
                    });
                }
            }
        }
        if let Some(owner) = &self.owner {
            // Recursive ownership of the contents is not verified file by
            // file, so an owned directory always diffs and the chown -R
            // shows up in the plan.
            return Ok(ResourceState::Modified {
                from: "unverified ownership".to_string(),
                to: format!("owned by {owner}"),
            });
        }
        Ok(ResourceState::Present { details: None })
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

        let existed = self.path.is_dir();
        let needs_change = self.needs_apply()?;
        if existed && !needs_change && self.owner.is_none() {
            return Ok(ApplyResult::NoChange);
        }

        self.converge()?;

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

    #[test]
    fn absent_directory_diffs_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let resource = Directory::new(dir.path().join("missing"));
        assert_eq!(resource.current_state().unwrap(), ResourceState::Absent);
    }

    #[test]
    fn creates_directory_with_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials");
        let resource = Directory::new(path.clone()).with_mode(0o700);

        let mut ctx = ApplyContext {
            dry_run: false,
            verbose: false,
        };
        let result = resource.apply(&mut ctx).unwrap();
        assert!(matches!(result, ApplyResult::Created));
        assert!(path.is_dir());

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o7777;
        assert_eq!(mode, 0o700);
    }

    #[test]
    fn owned_directory_always_diffs_as_modified() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("d");
        fs::create_dir(&path).unwrap();

        // The pending chown -R must show in the plan even though the
        // directory itself already exists with an acceptable mode.
        let resource = Directory::new(path).owned_by("chat");
        assert!(matches!(
            resource.current_state().unwrap(),
            ResourceState::Modified { .. }
        ));
        assert!(resource.needs_apply().unwrap());
    }

    #[test]
    fn unowned_existing_directory_is_present() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("d");
        fs::create_dir(&path).unwrap();

        let resource = Directory::new(path);
        assert_eq!(
            resource.current_state().unwrap(),
            ResourceState::Present { details: None }
        );
    }

    #[test]
    fn wrong_mode_diffs_as_modified() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("d");
        fs::create_dir(&path).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();

        let resource = Directory::new(path).with_mode(0o700);
        assert!(matches!(
            resource.current_state().unwrap(),
            ResourceState::Modified { .. }
        ));
    }

    #[test]
    fn dry_run_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing");
        let resource = Directory::new(path.clone());

        let mut ctx = ApplyContext {
            dry_run: true,
            verbose: false,
        };
        let result = resource.apply(&mut ctx).unwrap();
        assert!(matches!(result, ApplyResult::Skipped { .. }));
        assert!(!path.exists());
    }
}
