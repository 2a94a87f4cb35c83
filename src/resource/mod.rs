//! Resource trait and types for declarative provisioning
//!
//! Every provisioning step is modeled as a Resource with:
//! - State detection (current vs desired)
//! - Apply function (converge current → desired)
//!
//! Re-running the provisioner therefore converges instead of blindly
//! re-executing every step. The one deliberate exception is the service
//! unit, whose embedded secret is regenerated on every run.

#![allow(dead_code)]

use anyhow::Result;
use std::fmt;

/// Current or desired state of a resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceState {
    /// Resource exists/is configured
    Present { details: Option<String> },
    /// Resource does not exist/is not configured
    Absent,
    /// Resource exists but differs from desired
    Modified { from: String, to: String },
    /// State cannot be determined
    Unknown,
}

/// Result of applying a resource
#[derive(Debug, Clone)]
pub enum ApplyResult {
    /// No changes needed
    NoChange,
    /// Resource was created
    Created,
    /// Resource was modified
    Modified,
    /// Resource was removed
    Removed,
    /// Apply failed
    Failed { error: String },
    /// Apply was skipped
    Skipped { reason: String },
}

/// Context passed to apply operations
pub struct ApplyContext {
    pub dry_run: bool,
    pub verbose: bool,
}

/// Core trait for all provisioning resources
pub trait Resource: Send + Sync + fmt::Debug {
    /// Unique identifier (e.g. "package:python3", "unit:chat.service")
    fn id(&self) -> String;

    /// Human-readable description
    fn description(&self) -> String;

    /// Resource type category (e.g. "os_package", "system_user", "systemd_unit")
    fn resource_type(&self) -> &'static str;

    /// Detect current state of this resource
    fn current_state(&self) -> Result<ResourceState>;

    /// Get the desired state (from config)
    fn desired_state(&self) -> ResourceState;

    /// Check if resource needs changes
    fn needs_apply(&self) -> Result<bool> {
        let current = self.current_state()?;
        let desired = self.desired_state();
        Ok(current != desired)
    }

    /// Apply changes to reach desired state
    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult>;
}

/// A diff between current and desired state
#[derive(Debug, Clone)]
pub struct ResourceDiff {
    pub resource_id: String,
    pub resource_type: String,
    pub description: String,
    pub current: ResourceState,
    pub desired: ResourceState,
}

impl ResourceDiff {
    pub fn from_resource(resource: &dyn Resource) -> Result<Option<Self>> {
        let current = resource.current_state()?;
        let desired = resource.desired_state();

        if current == desired {
            return Ok(None);
        }

        Ok(Some(Self {
            resource_id: resource.id(),
            resource_type: resource.resource_type().to_string(),
            description: resource.description(),
            current,
            desired,
        }))
    }
}

// Re-export submodules
pub mod code_copy;
pub mod config_file;
pub mod directory;
pub mod os_package;
pub mod service;
pub mod system_user;
pub mod systemd_unit;
pub mod virtualenv;

pub use code_copy::CodeCopy;
pub use config_file::ConfigFile;
pub use directory::Directory;
pub use os_package::{OsFamily, OsPackage};
pub use service::SystemdService;
pub use system_user::SystemUser;
pub use systemd_unit::SystemdUnit;
pub use virtualenv::Virtualenv;
