//! OS package resource - install runtime packages via the native manager

use anyhow::{Context, Result, bail};
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{ApplyContext, ApplyResult, Resource, ResourceState};
use crate::runner;

/// Supported OS families. Anything else is a fatal precondition error,
/// raised before any package installation is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    Debian,
    RedHat,
}

impl OsFamily {
    /// Detect the OS family from /etc/os-release
    pub fn detect() -> Result<Self> {
        let content =
            fs::read_to_string("/etc/os-release").context("Could not read /etc/os-release")?;
        Self::from_os_release(&content)
    }

    /// Parse an os-release body into a family, matching ID then ID_LIKE
    pub fn from_os_release(content: &str) -> Result<Self> {
        let mut id = String::new();
        let mut id_like = String::new();

        for line in content.lines() {
            if let Some(value) = line.strip_prefix("ID=") {
                id = value.trim_matches('"').to_ascii_lowercase();
            } else if let Some(value) = line.strip_prefix("ID_LIKE=") {
                id_like = value.trim_matches('"').to_ascii_lowercase();
            }
        }

        let candidates = std::iter::once(id.as_str()).chain(id_like.split_whitespace());
        for candidate in candidates {
            match candidate {
                "debian" | "ubuntu" => return Ok(Self::Debian),
                "rhel" | "centos" | "fedora" | "amzn" | "rocky" | "almalinux" => {
                    return Ok(Self::RedHat);
                }
                _ => {}
            }
        }

        bail!(
            "Unsupported OS family (ID={}): skiff can provision Debian- and RedHat-family hosts only",
            if id.is_empty() { "unknown" } else { &id }
        )
    }

    /// The install command for this family
    pub fn install_command(self) -> (&'static str, &'static [&'static str]) {
        match self {
            Self::Debian => ("apt-get", &["install", "-y"]),
            Self::RedHat => {
                if runner::command_exists("dnf") {
                    ("dnf", &["install", "-y"])
                } else {
                    ("yum", &["install", "-y"])
                }
            }
        }
    }

    /// Index refresh run once before the first install of a provisioning
    /// run. Fresh Debian images ship with stale or empty package lists;
    /// dnf/yum refresh metadata on demand.
    pub fn update_command(self) -> Option<(&'static str, &'static [&'static str])> {
        match self {
            Self::Debian => Some(("apt-get", &["update"])),
            Self::RedHat => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Debian => "debian",
            Self::RedHat => "redhat",
        }
    }
}

/// A package installed via the OS package manager
#[derive(Debug, Clone)]
pub struct OsPackage {
    pub name: String,
    pub family: OsFamily,
}

impl OsPackage {
    pub fn new(name: &str, family: OsFamily) -> Self {
        Self {
            name: name.to_string(),
            family,
        }
    }

    /// Check if the package is installed
    fn is_installed(&self) -> bool {
        match self.family {
            OsFamily::Debian => runner::run_quiet("dpkg", &["-s", &self.name]),
            OsFamily::RedHat => runner::run_quiet("rpm", &["-q", &self.name]),
        }
    }

    fn install(&self) -> Result<()> {
        refresh_index(self.family)?;

        let (cmd, base_args) = self.family.install_command();
        let mut args: Vec<&str> = base_args.to_vec();
        args.push(&self.name);

        let status = runner::run(cmd, &args)
            .with_context(|| format!("Failed to run {} install", cmd))?;
        if !status.success() {
            bail!("{} install {} failed (exit {})", cmd, self.name, status);
        }
        Ok(())
    }
}

/// Refresh the package index at most once per process, and only when a
/// package actually needs installing
fn refresh_index(family: OsFamily) -> Result<()> {
    let Some((cmd, args)) = family.update_command() else {
        return Ok(());
    };

    static REFRESHED: AtomicBool = AtomicBool::new(false);
    if REFRESHED.swap(true, Ordering::SeqCst) {
        return Ok(());
    }

    let status = runner::run(cmd, args).with_context(|| format!("Failed to run {cmd} update"))?;
    if !status.success() {
        bail!("{} update failed (exit {})", cmd, status);
    }
    Ok(())
}

impl Resource for OsPackage {
    fn id(&self) -> String {
        format!("package:{}", self.name)
    }

    fn description(&self) -> String {
        format!("Install {} via {}", self.name, self.family.install_command().0)
    }

    fn resource_type(&self) -> &'static str {
        "os_package"
    }

    fn current_state(&self) -> Result<ResourceState> {
        if self.is_installed() {
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

        if self.is_installed() {
            return Ok(ApplyResult::NoChange);
        }

        self.install()?;
        Ok(ApplyResult::Created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ubuntu_is_debian_family() {
        let content = "NAME=\"Ubuntu\"\nID=ubuntu\nID_LIKE=debian\n";
        assert_eq!(OsFamily::from_os_release(content).unwrap(), OsFamily::Debian);
    }

    #[test]
    fn amazon_linux_is_redhat_family() {
        let content = "NAME=\"Amazon Linux\"\nID=\"amzn\"\nID_LIKE=\"centos rhel fedora\"\n";
        assert_eq!(OsFamily::from_os_release(content).unwrap(), OsFamily::RedHat);
    }

    #[test]
    fn id_like_is_consulted_when_id_is_unknown() {
        let content = "ID=pop\nID_LIKE=\"ubuntu debian\"\n";
        assert_eq!(OsFamily::from_os_release(content).unwrap(), OsFamily::Debian);
    }

    #[test]
    fn unsupported_family_is_fatal() {
        let content = "NAME=\"Alpine Linux\"\nID=alpine\n";
        let err = OsFamily::from_os_release(content).unwrap_err();
        assert!(err.to_string().contains("Unsupported OS family"));
        assert!(err.to_string().contains("alpine"));
    }

    #[test]
    fn empty_os_release_is_fatal() {
        assert!(OsFamily::from_os_release("").is_err());
    }

    #[test]
    fn only_debian_refreshes_the_package_index() {
        assert_eq!(
            OsFamily::Debian.update_command(),
            Some(("apt-get", &["update"][..]))
        );
        assert_eq!(OsFamily::RedHat.update_command(), None);
    }
}
