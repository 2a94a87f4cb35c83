//! Remote execution and file copy over ssh/scp.
//!
//! Every call shells out to the system ssh/scp binaries in BatchMode with a
//! fixed connect timeout. Failures propagate the underlying tool's exit
//! status; there is no retry at this layer.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::runner;
use crate::schema::TargetConfig;

const CONNECT_TIMEOUT_SECS: u32 = 10;

/// A deployment target reachable over ssh
#[derive(Debug, Clone)]
pub struct RemoteHost {
    host: String,
    user: String,
    key: PathBuf,
}

impl RemoteHost {
    pub fn from_target(target: &TargetConfig, key: PathBuf) -> Self {
        Self {
            host: target.host.clone(),
            user: target.user.clone(),
            key,
        }
    }

    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    pub fn key_path(&self) -> &Path {
        &self.key
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn base_options(&self) -> Vec<String> {
        vec![
            "-i".to_string(),
            self.key.to_string_lossy().to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={CONNECT_TIMEOUT_SECS}"),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
        ]
    }

    /// Run a remote command and capture its output
    pub fn run_capture(&self, command: &str) -> Result<String> {
        let mut args = self.base_options();
        args.push(self.destination());
        args.push(command.to_string());
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();

        log::debug!("ssh {}: {}", self.host, command);
        runner::run_capture("ssh", &arg_refs)
            .with_context(|| format!("Remote command failed on {}: {}", self.host, command))
    }

    /// Run a strict fail-fast command sequence remotely (joined with `&&`),
    /// streaming output to the operator's terminal
    pub fn run_script(&self, commands: &[String]) -> Result<()> {
        let script = commands.join(" && ");
        let mut args = self.base_options();
        args.push(self.destination());
        args.push(script.clone());
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();

        log::debug!("ssh {}: {}", self.host, script);
        let status = runner::run("ssh", &arg_refs)?;
        if !status.success() {
            anyhow::bail!(
                "Remote command sequence failed on {} (exit {})",
                self.host,
                status
            );
        }
        Ok(())
    }

    /// Copy local entries to a remote directory in one scp invocation
    pub fn copy_entries(&self, sources: &[PathBuf], dest: &str) -> Result<()> {
        if sources.is_empty() {
            return Ok(());
        }
        let mut args = self.base_options();
        args.push("-r".to_string());
        for source in sources {
            args.push(source.to_string_lossy().to_string());
        }
        args.push(format!("{}:{}", self.destination(), dest));
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();

        log::debug!("scp {} entries -> {}:{}", sources.len(), self.host, dest);
        let status = runner::run("scp", &arg_refs)?;
        if !status.success() {
            anyhow::bail!("scp to {} failed (exit {})", self.host, status);
        }
        Ok(())
    }

    /// One-shot check whether a systemd service is active on the target
    pub fn is_active(&self, service: &str) -> bool {
        match self.run_capture(&format!("systemctl is-active {service}")) {
            Ok(output) => output.trim() == "active",
            Err(e) => {
                log::debug!("is-active check failed: {e:#}");
                false
            }
        }
    }

    /// Fetch a short status snippet for a service
    pub fn service_status(&self, service: &str) -> Result<String> {
        self.run_capture(&format!(
            "systemctl show {service} --property=ActiveState,SubState,ExecMainStartTimestamp --no-pager"
        ))
    }
}

/// Quote a path for use inside a remote shell command
pub fn shell_quote(path: &Path) -> String {
    let s = path.to_string_lossy();
    if s.chars().all(|c| c.is_ascii_alphanumeric() || "/._-".contains(c)) {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destination_is_user_at_host() {
        let target = TargetConfig {
            host: "10.0.0.12".into(),
            user: "deploy".into(),
            key_file: "key".into(),
            app_dir: "/opt/chat".into(),
            service: "chat".into(),
            port: 8501,
        };
        let remote = RemoteHost::from_target(&target, PathBuf::from("/tmp/key"));
        assert_eq!(remote.destination(), "deploy@10.0.0.12");
    }

    #[test]
    fn shell_quote_passes_plain_paths_through() {
        assert_eq!(shell_quote(Path::new("/opt/chat/app.py")), "/opt/chat/app.py");
    }

    #[test]
    fn shell_quote_wraps_paths_with_spaces() {
        assert_eq!(shell_quote(Path::new("/opt/my app")), "'/opt/my app'");
    }
}
