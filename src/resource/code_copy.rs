//! Code copy resource - place one manifest artifact into the app dir

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::{ApplyContext, ApplyResult, Resource, ResourceState};

/// One file copied from the code directory into the application directory.
/// Content hashes decide whether anything actually changed.
#[derive(Debug, Clone)]
pub struct CodeCopy {
    pub source: PathBuf,
    pub dest: PathBuf,
}

impl CodeCopy {
    pub fn new(source: PathBuf, dest: PathBuf) -> Self {
        Self { source, dest }
    }

    fn hash_file(path: &Path) -> Result<blake3::Hash> {
        let content =
            fs::read(path).with_context(|| format!("Could not read {}", path.display()))?;
        Ok(blake3::hash(&content))
    }
}

impl Resource for CodeCopy {
    fn id(&self) -> String {
        format!("code:{}", self.dest.display())
    }

    fn description(&self) -> String {
        format!("Copy {} -> {}", self.source.display(), self.dest.display())
    }

    fn resource_type(&self) -> &'static str {
        "code_copy"
    }

    fn current_state(&self) -> Result<ResourceState> {
        if !self.dest.exists() {
            return Ok(ResourceState::Absent);
        }

        let source_hash = Self::hash_file(&self.source)?;
        let dest_hash = Self::hash_file(&self.dest)?;

        if source_hash == dest_hash {
            Ok(ResourceState::Present { details: None })
        } else {
            Ok(ResourceState::Modified {
                from: dest_hash.to_hex().chars().take(8).collect(),
                to: source_hash.to_hex().chars().take(8).collect(),
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

        if let Some(parent) = self.dest.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Could not create {}", parent.display()))?;
        }
        fs::copy(&self.source, &self.dest).with_context(|| {
            format!(
                "Could not copy {} to {}",
                self.source.display(),
                self.dest.display()
            )
        })?;

        match state {
            ResourceState::Absent => Ok(ApplyResult::Created),
            _ => Ok(ApplyResult::Modified),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_content_is_no_change() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.py");
        let dest = dir.path().join("out/a.py");
        fs::write(&source, "print('hi')").unwrap();
        fs::create_dir_all(dest.parent().unwrap()).unwrap();
        fs::write(&dest, "print('hi')").unwrap();

        let resource = CodeCopy::new(source, dest);
        assert_eq!(
            resource.current_state().unwrap(),
            ResourceState::Present { details: None }
        );
    }

    #[test]
    fn changed_content_is_modified_and_converges() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.py");
        let dest = dir.path().join("out/a.py");
        fs::write(&source, "print('new')").unwrap();
        fs::create_dir_all(dest.parent().unwrap()).unwrap();
        fs::write(&dest, "print('old')").unwrap();

        let resource = CodeCopy::new(source, dest.clone());
        assert!(matches!(
            resource.current_state().unwrap(),
            ResourceState::Modified { .. }
        ));

        let mut ctx = ApplyContext {
            dry_run: false,
            verbose: false,
        };
        let result = resource.apply(&mut ctx).unwrap();
        assert!(matches!(result, ApplyResult::Modified));
        assert_eq!(fs::read_to_string(&dest).unwrap(), "print('new')");
    }

    #[test]
    fn missing_dest_is_created_with_parents() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.py");
        let dest = dir.path().join("deep/nested/a.py");
        fs::write(&source, "x = 1").unwrap();

        let resource = CodeCopy::new(source, dest.clone());
        let mut ctx = ApplyContext {
            dry_run: false,
            verbose: false,
        };
        let result = resource.apply(&mut ctx).unwrap();
        assert!(matches!(result, ApplyResult::Created));
        assert!(dest.is_file());
    }
}
