//! Execution - deploy state machine and sequential provision apply

use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::progress;
use crate::remote::RemoteHost;
use crate::resource::{ApplyContext, ApplyResult};
use crate::ui;

use super::differ::{compute_diffs, display_diff};
use super::planner::{DeployPlan, ProvisionPlan};

// ============================================================================
// Deploy state machine
// ============================================================================

/// States of a deploy run. Syncing and Restarting are retryable; Validating
/// failures are deterministic preconditions and abort immediately; a failed
/// Verifying check is reported as a warning, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployState {
    Validating,
    Syncing,
    Restarting,
    Verifying,
    Done,
    Failed,
}

impl DeployState {
    pub fn name(self) -> &'static str {
        match self {
            Self::Validating => "validating",
            Self::Syncing => "syncing",
            Self::Restarting => "restarting",
            Self::Verifying => "verifying",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

/// Options for a deploy run
#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// Show the plan, touch nothing
    pub dry_run: bool,
    /// Retry budget for each retryable state
    pub retries: usize,
    /// Fixed delay before the one-shot verify check
    pub delay_secs: u64,
    /// Optional HTTP endpoint polled after the systemd check
    pub health_url: Option<String>,
}

/// What a deploy run accomplished
#[derive(Debug, Default)]
pub struct DeployOutcome {
    pub files_synced: usize,
    /// Whether the post-restart check saw the service active
    pub verified: bool,
}

/// Drive the deploy state machine to completion
pub fn run_deploy(
    plan: &DeployPlan,
    remote: &RemoteHost,
    opts: &DeployOptions,
) -> Result<DeployOutcome> {
    let mut state = DeployState::Validating;
    let mut outcome = DeployOutcome::default();
    let mut failure: Option<anyhow::Error> = None;

    loop {
        log::info!("deploy state: {}", state.name());
        state = match state {
            DeployState::Validating => match validate(plan, remote.key_path()) {
                Ok(()) if opts.dry_run => {
                    show_dry_run(plan);
                    DeployState::Done
                }
                Ok(()) => DeployState::Syncing,
                // Precondition failures are never retried
                Err(e) => {
                    failure = Some(e);
                    DeployState::Failed
                }
            },
            DeployState::Syncing => {
                match with_retries("sync", opts.retries, || sync(plan, remote)) {
                    Ok(()) => {
                        outcome.files_synced = plan.artifacts.len();
                        DeployState::Restarting
                    }
                    Err(e) => {
                        failure = Some(e);
                        DeployState::Failed
                    }
                }
            }
            DeployState::Restarting => {
                match with_retries("restart", opts.retries, || {
                    remote.run_script(&plan.restart_script())
                }) {
                    Ok(()) => DeployState::Verifying,
                    Err(e) => {
                        failure = Some(e);
                        DeployState::Failed
                    }
                }
            }
            DeployState::Verifying => {
                outcome.verified = verify(plan, remote, opts);
                DeployState::Done
            }
            DeployState::Done => break,
            DeployState::Failed => {
                return Err(failure
                    .unwrap_or_else(|| anyhow::anyhow!("deploy failed in an unknown state")));
            }
        };
    }

    Ok(outcome)
}

/// Run an operation with a bounded retry budget
fn with_retries<T>(
    what: &str,
    retries: usize,
    mut op: impl FnMut() -> Result<T>,
) -> Result<T> {
    let attempts = retries + 1;
    let mut last_err = None;

    for attempt in 1..=attempts {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempt < attempts {
                    ui::warn(&format!(
                        "{} failed (attempt {}/{}): {:#}, retrying",
                        what, attempt, attempts, e
                    ));
                }
                last_err = Some(e);
            }
        }
    }

    Err(last_err
        .unwrap_or_else(|| anyhow::anyhow!("{what} failed"))
        .context(format!("{what} exhausted its retry budget")))
}

fn validate(plan: &DeployPlan, key: &Path) -> Result<()> {
    if !key.exists() {
        anyhow::bail!(
            "SSH key not found: {} (no network operation attempted)",
            key.display()
        );
    }
    if plan.is_empty() {
        anyhow::bail!("Deployment manifest is empty");
    }
    for artifact in &plan.artifacts {
        if !artifact.source.is_file() {
            anyhow::bail!("Manifest file missing: {}", artifact.source.display());
        }
    }
    Ok(())
}

fn show_dry_run(plan: &DeployPlan) {
    println!();
    println!("  {} Dry run - no changes made", "ℹ".blue());
    ui::section("Would sync");
    for line in plan.describe_artifacts() {
        ui::dim(&line);
    }
    ui::section("Would run remotely");
    for cmd in plan
        .promote_script()
        .iter()
        .chain(plan.restart_script().iter())
    {
        ui::dim(cmd);
    }
}

/// Copy the artifact set to the remote staging dir and promote it into the
/// live application directory. Idempotent: the staging dir is recreated on
/// every attempt.
fn sync(plan: &DeployPlan, remote: &RemoteHost) -> Result<()> {
    let local_staging = stage_locally(plan)?;

    let result = (|| {
        remote.run_script(&plan.prepare_script())?;

        let entries: Vec<PathBuf> = fs::read_dir(&local_staging)
            .context("Could not read local staging dir")?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .collect();

        let pb = progress::spinner(&format!("Copying {} file(s)", plan.artifacts.len()));
        let copied = remote.copy_entries(&entries, &plan.staging_dir);
        pb.finish_and_clear();
        copied?;

        remote.run_script(&plan.promote_script())
    })();

    let _ = fs::remove_dir_all(&local_staging);
    result
}

/// Mirror the artifact set into a local staging tree so one scp -r call
/// preserves relative target paths
fn stage_locally(plan: &DeployPlan) -> Result<PathBuf> {
    let staging = std::env::temp_dir().join(format!("skiff-stage-{}", std::process::id()));
    let _ = fs::remove_dir_all(&staging);
    fs::create_dir_all(&staging).context("Could not create local staging dir")?;

    for artifact in &plan.artifacts {
        let dest = staging.join(&artifact.target);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&artifact.source, &dest).with_context(|| {
            format!("Could not stage {}", artifact.source.display())
        })?;
    }

    Ok(staging)
}

/// One-shot post-restart verification after a fixed delay. Failure is a
/// warning with a log-inspection hint, never fatal.
fn verify(plan: &DeployPlan, remote: &RemoteHost, opts: &DeployOptions) -> bool {
    ui::info(&format!(
        "Waiting {}s before checking service state...",
        opts.delay_secs
    ));
    thread::sleep(Duration::from_secs(opts.delay_secs));

    let mut healthy = remote.is_active(&plan.service);

    if healthy {
        ui::success(&format!("{} is active", plan.service));
    } else {
        ui::warn(&format!(
            "{} is not active; inspect with: journalctl -u {} -n 50",
            plan.service, plan.service
        ));
    }

    if let Some(url) = &opts.health_url {
        match ureq::get(url).call() {
            Ok(_) => ui::success(&format!("Health endpoint {} responded", url)),
            Err(e) => {
                healthy = false;
                ui::warn(&format!("Health endpoint {} failed: {}", url, e));
            }
        }
    }

    healthy
}

// ============================================================================
// Provision executor
// ============================================================================

/// Options for a provisioning run
#[derive(Debug, Clone, Default)]
pub struct ProvisionOptions {
    pub dry_run: bool,
    /// Skip confirmation prompts
    pub yes: bool,
    pub verbose: bool,
}

/// Summary of provisioning results
#[derive(Debug, Default)]
pub struct ProvisionSummary {
    pub created: usize,
    pub modified: usize,
    pub skipped: usize,
    pub failed: usize,
    pub no_change: usize,
}

impl ProvisionSummary {
    pub fn total_changes(&self) -> usize {
        self.created + self.modified
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Apply the provisioning plan strictly in order, aborting at the first
/// failure (no retry, no rollback)
pub fn run_provision(plan: &ProvisionPlan, opts: &ProvisionOptions) -> Result<ProvisionSummary> {
    let diffs = compute_diffs(&plan.resources);
    display_diff(&diffs);

    let mut summary = ProvisionSummary::default();

    if opts.dry_run {
        println!();
        println!("  {} Dry run - no changes made", "ℹ".blue());
        return Ok(summary);
    }

    if !opts.yes && !confirm_proceed()? {
        println!();
        println!("  {} Aborted", "✗".red());
        summary.skipped = plan.len();
        return Ok(summary);
    }

    println!();
    println!(
        "  {} Applying {} resource(s)...",
        "→".cyan(),
        plan.len()
    );

    let pb = progress::bar(plan.len() as u64, "Applying");

    for resource in &plan.resources {
        let mut ctx = ApplyContext {
            dry_run: false,
            verbose: opts.verbose,
        };

        let result = match resource.apply(&mut ctx) {
            Ok(r) => r,
            Err(e) => ApplyResult::Failed {
                error: format!("{e:#}"),
            },
        };

        let symbol = match &result {
            ApplyResult::NoChange => "○",
            ApplyResult::Created | ApplyResult::Modified | ApplyResult::Removed => "✓",
            ApplyResult::Failed { .. } => "✗",
            ApplyResult::Skipped { .. } => "⊘",
        };
        pb.set_message(format!("{} {}", symbol, resource.id()));
        pb.inc(1);

        match result {
            ApplyResult::NoChange => summary.no_change += 1,
            ApplyResult::Created => summary.created += 1,
            ApplyResult::Modified | ApplyResult::Removed => summary.modified += 1,
            ApplyResult::Skipped { .. } => summary.skipped += 1,
            ApplyResult::Failed { error } => {
                summary.failed += 1;
                pb.finish_and_clear();
                ui::error(&format!("{} failed: {}", resource.id(), error));
                // Strict fail-fast: later resources depend on earlier ones
                print_summary(&summary);
                return Ok(summary);
            }
        }
    }

    pb.finish_and_clear();
    print_summary(&summary);
    Ok(summary)
}

fn confirm_proceed() -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt("Continue?")
        .default(true)
        .interact()?;

    Ok(confirmed)
}

fn print_summary(summary: &ProvisionSummary) {
    println!();
    if summary.is_success() {
        println!("  {} Provisioning applied successfully!", "✓".green().bold());
    } else {
        println!("  {} Provisioning aborted with errors", "⚠".yellow().bold());
    }

    if summary.created > 0 {
        println!("    • {} resource(s) created", summary.created);
    }
    if summary.modified > 0 {
        println!("    • {} resource(s) modified", summary.modified);
    }
    if summary.no_change > 0 {
        println!("    • {} resource(s) already converged", summary.no_change);
    }
    if summary.skipped > 0 {
        println!("    • {} resource(s) skipped", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "resource(s)".red());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Resource, ResourceState};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A provisioning step that records whether it was applied and can be
    /// told to fail
    #[derive(Debug)]
    struct ScriptedStep {
        name: &'static str,
        fail: bool,
        applied: Arc<AtomicUsize>,
    }

    impl ScriptedStep {
        fn new(name: &'static str, fail: bool) -> (Self, Arc<AtomicUsize>) {
            let applied = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    name,
                    fail,
                    applied: Arc::clone(&applied),
                },
                applied,
            )
        }
    }

    impl Resource for ScriptedStep {
        fn id(&self) -> String {
            format!("step:{}", self.name)
        }

        fn description(&self) -> String {
            format!("Step {}", self.name)
        }

        fn resource_type(&self) -> &'static str {
            "step"
        }

        fn current_state(&self) -> Result<ResourceState> {
            Ok(ResourceState::Absent)
        }

        fn desired_state(&self) -> ResourceState {
            ResourceState::Present { details: None }
        }

        fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
            self.applied.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Ok(ApplyResult::Failed {
                    error: "scripted failure".to_string(),
                })
            } else {
                Ok(ApplyResult::Created)
            }
        }
    }

    #[test]
    fn provision_aborts_at_the_first_failed_resource() {
        let (ok_step, ok_applied) = ScriptedStep::new("packages", false);
        let (bad_step, bad_applied) = ScriptedStep::new("venv", true);
        let (later_step, later_applied) = ScriptedStep::new("service", false);

        let mut plan = ProvisionPlan::new();
        plan.add(Box::new(ok_step));
        plan.add(Box::new(bad_step));
        plan.add(Box::new(later_step));

        let opts = ProvisionOptions {
            dry_run: false,
            yes: true,
            verbose: false,
        };
        let summary = run_provision(&plan, &opts).unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.created, 1);
        assert!(!summary.is_success());
        assert_eq!(ok_applied.load(Ordering::SeqCst), 1);
        assert_eq!(bad_applied.load(Ordering::SeqCst), 1);
        // Resources after the failure must never run
        assert_eq!(later_applied.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn dry_run_provision_applies_nothing() {
        let (step, applied) = ScriptedStep::new("packages", false);
        let mut plan = ProvisionPlan::new();
        plan.add(Box::new(step));

        let opts = ProvisionOptions {
            dry_run: true,
            yes: true,
            verbose: false,
        };
        let summary = run_provision(&plan, &opts).unwrap();

        assert_eq!(summary.total_changes(), 0);
        assert_eq!(applied.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn retry_budget_is_attempts_minus_one() {
        let mut calls = 0;
        let result: Result<()> = with_retries("op", 2, || {
            calls += 1;
            anyhow::bail!("nope")
        });
        assert!(result.is_err());
        assert_eq!(calls, 3);
    }

    #[test]
    fn retries_stop_on_first_success() {
        let mut calls = 0;
        let result = with_retries("op", 2, || {
            calls += 1;
            if calls < 2 {
                anyhow::bail!("transient")
            }
            Ok(calls)
        });
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls, 2);
    }

    #[test]
    fn zero_retries_means_one_attempt() {
        let mut calls = 0;
        let result: Result<()> = with_retries("op", 0, || {
            calls += 1;
            anyhow::bail!("nope")
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn missing_key_aborts_validation() {
        let dir = tempfile::tempdir().unwrap();
        let plan = DeployPlan {
            artifacts: vec![],
            staging_dir: "/tmp/s".into(),
            app_dir: "/opt/app".into(),
            service: "app".into(),
            run_user: "app".into(),
            post_copy: vec![],
        };
        let err = validate(&plan, &dir.path().join("missing.pem")).unwrap_err();
        assert!(err.to_string().contains("SSH key not found"));
    }

    #[test]
    fn state_names_are_stable() {
        assert_eq!(DeployState::Validating.name(), "validating");
        assert_eq!(DeployState::Syncing.name(), "syncing");
        assert_eq!(DeployState::Restarting.name(), "restarting");
        assert_eq!(DeployState::Verifying.name(), "verifying");
        assert_eq!(DeployState::Done.name(), "done");
        assert_eq!(DeployState::Failed.name(), "failed");
    }
}
