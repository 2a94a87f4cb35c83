//! Unified skiff configuration schema
//!
//! One TOML (or JSON) file describes everything skiff knows about a
//! deployment: the target host, the deployment descriptor (which files ship
//! and where they land), the remote service, and the provisioning inputs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Top-level configuration
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SkiffConfig {
    pub target: TargetConfig,

    #[serde(default)]
    pub manifest: ManifestConfig,

    #[serde(default)]
    pub service: ServiceConfig,

    #[serde(default)]
    pub provision: ProvisionConfig,

    #[serde(default)]
    pub health: HealthConfig,
}

/// Deployment target: where the service runs
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Host address (IP or DNS name)
    pub host: String,

    /// SSH user
    pub user: String,

    /// Path to the SSH private key. Must exist before any network operation.
    pub key_file: String,

    /// Remote application directory
    #[serde(default = "default_app_dir")]
    pub app_dir: String,

    /// systemd service name
    #[serde(default = "default_service_name")]
    pub service: String,

    /// Listening port of the application
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_app_dir() -> String {
    "/opt/app".to_string()
}

fn default_service_name() -> String {
    "app".to_string()
}

fn default_port() -> u16 {
    8501
}

/// Declarative deployment descriptor: which files ship, and what runs after
/// the copy. Membership is as declared, never discovered.
#[derive(Debug, Serialize, Deserialize)]
pub struct ManifestConfig {
    /// Individual files, relative to the project root
    #[serde(default)]
    pub files: Vec<String>,

    /// Directory trees, relative to the project root (expanded at plan time)
    #[serde(default)]
    pub trees: Vec<String>,

    /// Remote staging directory for the copy
    #[serde(default = "default_staging_dir")]
    pub staging_dir: String,

    /// Extra remote commands to run after the copy, before the restart
    #[serde(default)]
    pub post_copy: Vec<String>,
}

fn default_staging_dir() -> String {
    "/tmp/skiff-staging".to_string()
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            trees: Vec::new(),
            staging_dir: default_staging_dir(),
            post_copy: Vec::new(),
        }
    }
}

/// Remote service descriptor, realized as a systemd unit at provision time
#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Low-privilege user the service runs as
    #[serde(default = "default_run_user")]
    pub run_user: String,

    /// Bind address for the application server
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Command line started by the supervisor, relative to the app dir
    #[serde(default = "default_exec_start")]
    pub exec_start: String,

    /// systemd restart policy
    #[serde(default = "default_restart")]
    pub restart: String,

    /// Runtime config file written under the app dir
    #[serde(default = "default_config_path")]
    pub config_path: String,

    /// Directory holding credentials files; created with mode 0700
    #[serde(default = "default_credentials_dir")]
    pub credentials_dir: String,

    /// Name of the environment variable that receives the generated secret
    #[serde(default = "default_secret_env")]
    pub secret_env: String,

    /// Static environment variables exposed to the service
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

fn default_run_user() -> String {
    "app".to_string()
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_exec_start() -> String {
    ".venv/bin/python app.py".to_string()
}

fn default_restart() -> String {
    "always".to_string()
}

fn default_config_path() -> String {
    "config/server.toml".to_string()
}

fn default_credentials_dir() -> String {
    ".credentials".to_string()
}

fn default_secret_env() -> String {
    "APP_SECRET".to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            run_user: default_run_user(),
            bind_address: default_bind_address(),
            exec_start: default_exec_start(),
            restart: default_restart(),
            config_path: default_config_path(),
            credentials_dir: default_credentials_dir(),
            secret_env: default_secret_env(),
            env: BTreeMap::new(),
        }
    }
}

/// Inputs for provisioning a fresh machine
#[derive(Debug, Serialize, Deserialize)]
pub struct ProvisionConfig {
    /// Packages installed via the OS package manager
    #[serde(default = "default_packages")]
    pub packages: Vec<String>,

    /// Virtualenv directory, relative to the app dir
    #[serde(default = "default_venv_dir")]
    pub venv_dir: String,

    /// Requirements file, relative to the app dir
    #[serde(default = "default_requirements")]
    pub requirements: String,

    /// Local package cache. When this directory exists, dependency install
    /// runs offline (`--no-index --find-links`) with no override.
    #[serde(default = "default_package_cache")]
    pub package_cache: String,

    /// Where to copy code from when provisioning (defaults to cwd)
    #[serde(default = "default_code_dir")]
    pub code_dir: String,
}

fn default_packages() -> Vec<String> {
    vec!["python3".to_string(), "python3-pip".to_string(), "git".to_string()]
}

fn default_venv_dir() -> String {
    ".venv".to_string()
}

fn default_requirements() -> String {
    "requirements.txt".to_string()
}

fn default_package_cache() -> String {
    "wheelhouse".to_string()
}

fn default_code_dir() -> String {
    ".".to_string()
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            packages: default_packages(),
            venv_dir: default_venv_dir(),
            requirements: default_requirements(),
            package_cache: default_package_cache(),
            code_dir: default_code_dir(),
        }
    }
}

/// Post-restart verification
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Optional HTTP endpoint polled after the systemd check
    #[serde(default)]
    pub url: Option<String>,

    /// Fixed delay before the one-shot check
    #[serde(default = "default_delay_secs")]
    pub delay_secs: u64,

    /// Retry budget for the retryable deploy states
    #[serde(default = "default_retries")]
    pub retries: usize,
}

fn default_delay_secs() -> u64 {
    3
}

fn default_retries() -> usize {
    2
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            url: None,
            delay_secs: default_delay_secs(),
            retries: default_retries(),
        }
    }
}

// ============================================================================
// Validation
// ============================================================================

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("target.host must not be empty")]
    EmptyHost,

    #[error("target.user must not be empty")]
    EmptyUser,

    #[error("target.key_file must not be empty")]
    EmptyKeyFile,

    #[error("target.port must not be 0")]
    ZeroPort,

    #[error("target.app_dir must be an absolute path (got '{0}')")]
    RelativeAppDir(String),

    #[error("manifest must declare at least one file or tree")]
    EmptyManifest,

    #[error("manifest entry '{0}' must be a relative path")]
    AbsoluteManifestEntry(String),

    #[error("service.run_user must not be empty")]
    EmptyRunUser,
}

impl SkiffConfig {
    /// Semantic validation, run by `config validate` and `doctor`
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.target.host.trim().is_empty() {
            return Err(ValidationError::EmptyHost);
        }
        if self.target.user.trim().is_empty() {
            return Err(ValidationError::EmptyUser);
        }
        if self.target.key_file.trim().is_empty() {
            return Err(ValidationError::EmptyKeyFile);
        }
        if self.target.port == 0 {
            return Err(ValidationError::ZeroPort);
        }
        if !self.target.app_dir.starts_with('/') {
            return Err(ValidationError::RelativeAppDir(self.target.app_dir.clone()));
        }
        if self.manifest.files.is_empty() && self.manifest.trees.is_empty() {
            return Err(ValidationError::EmptyManifest);
        }
        for entry in self.manifest.files.iter().chain(self.manifest.trees.iter()) {
            if Path::new(entry).is_absolute() {
                return Err(ValidationError::AbsoluteManifestEntry(entry.clone()));
            }
        }
        if self.service.run_user.trim().is_empty() {
            return Err(ValidationError::EmptyRunUser);
        }
        Ok(())
    }

    /// Expanded SSH key path (`~` resolved)
    pub fn key_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.target.key_file).as_ref())
    }
}

// ============================================================================
// Manifest expansion
// ============================================================================

/// One file to ship: a local source and its path relative to the app dir
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub source: PathBuf,
    pub target: String,
}

impl ManifestConfig {
    /// Expand the descriptor against a project root into concrete artifacts.
    ///
    /// Tree entries are walked at plan time; the resulting artifact set is
    /// fixed for the rest of the run. A declared entry that does not exist
    /// on disk is an error, not a silent skip.
    pub fn expand(&self, root: &Path) -> anyhow::Result<Vec<Artifact>> {
        let mut artifacts = Vec::new();

        for file in &self.files {
            let source = root.join(file);
            if !source.is_file() {
                anyhow::bail!("Manifest file not found: {}", source.display());
            }
            artifacts.push(Artifact {
                source,
                target: file.clone(),
            });
        }

        for tree in &self.trees {
            let base = root.join(tree);
            if !base.is_dir() {
                anyhow::bail!("Manifest tree not found: {}", base.display());
            }
            for entry in WalkDir::new(&base).sort_by_file_name() {
                let entry = entry?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let relative = entry.path().strip_prefix(root)?;
                artifacts.push(Artifact {
                    source: entry.path().to_path_buf(),
                    target: relative.to_string_lossy().replace('\\', "/"),
                });
            }
        }

        Ok(artifacts)
    }
}

// ============================================================================
// Tests
// ============================================================================
