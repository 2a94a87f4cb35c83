//! Runtime configuration file resource

use anyhow::{Context, Result};
use colored::Colorize;
use similar::{ChangeTag, TextDiff};
use std::fs;
use std::path::PathBuf;

use super::{ApplyContext, ApplyResult, Resource, ResourceState};

/// A rendered configuration file written under the app dir
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub path: PathBuf,
    pub contents: String,
}

impl ConfigFile {
    pub fn new(path: PathBuf, contents: String) -> Self {
        Self { path, contents }
    }

    fn print_diff(&self, current: &str) {
        let diff = TextDiff::from_lines(current, &self.contents);
        for change in diff.iter_all_changes() {
            match change.tag() {
                ChangeTag::Delete => print!("    {}", format!("-{change}").red()),
                ChangeTag::Insert => print!("    {}", format!("+{change}").green()),
                ChangeTag::Equal => {}
            }
        }
    }
}

/// Render the application server config: port, bind address, security flags.
pub fn render_server_config(port: u16, bind_address: &str) -> String {
    format!(
        "[server]\n\
         port = {port}\n\
         address = \"{bind_address}\"\n\
         headless = true\n\
         enableCORS = false\n\
         enableXsrfProtection = true\n"
    )
}

impl Resource for ConfigFile {
    fn id(&self) -> String {
        format!("config:{}", self.path.display())
    }

    fn description(&self) -> String {
        format!("Write config {}", self.path.display())
    }

    fn resource_type(&self) -> &'static str {
        "config_file"
    }

    fn current_state(&self) -> Result<ResourceState> {
        if !self.path.exists() {
            return Ok(ResourceState::Absent);
        }
        let current = fs::read_to_string(&self.path)
            .with_context(|| format!("Could not read {}", self.path.display()))?;
        if current == self.contents {
            Ok(ResourceState::Present { details: None })
        } else {
            Ok(ResourceState::Modified {
                from: "on-disk config".to_string(),
                to: "rendered config".to_string(),
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

        if ctx.verbose {
            if let ResourceState::Modified { .. } = &state {
                let current = fs::read_to_string(&self.path).unwrap_or_default();
                self.print_diff(&current);
            }
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Could not create {}", parent.display()))?;
        }
        fs::write(&self.path, &self.contents)
            .with_context(|| format!("Could not write {}", self.path.display()))?;

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
    fn server_config_contains_port_and_address() {
        let rendered = render_server_config(8501, "0.0.0.0");
        assert!(rendered.contains("port = 8501"));
        assert!(rendered.contains("address = \"0.0.0.0\""));
        assert!(rendered.contains("enableXsrfProtection = true"));
    }

    #[test]
    fn unchanged_file_is_present() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.toml");
        let contents = render_server_config(8501, "0.0.0.0");
        fs::write(&path, &contents).unwrap();

        let resource = ConfigFile::new(path, contents);
        assert_eq!(
            resource.current_state().unwrap(),
            ResourceState::Present { details: None }
        );
    }

    #[test]
    fn apply_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config/server.toml");
        let resource = ConfigFile::new(path.clone(), render_server_config(9000, "127.0.0.1"));

        let mut ctx = ApplyContext {
            dry_run: false,
            verbose: false,
        };
        let result = resource.apply(&mut ctx).unwrap();
        assert!(matches!(result, ApplyResult::Created));
        assert!(fs::read_to_string(&path).unwrap().contains("port = 9000"));
    }

    #[test]
    fn drifted_file_converges() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.toml");
        fs::write(&path, "[server]\nport = 1234\n").unwrap();

        let resource = ConfigFile::new(path.clone(), render_server_config(8501, "0.0.0.0"));
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
        assert!(fs::read_to_string(&path).unwrap().contains("port = 8501"));
    }
}
