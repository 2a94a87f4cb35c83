//! Deploy command - ship local changes to the running remote instance
//!
//! Flow: precondition checks → commit pending changes (no-op when clean) →
//! push to origin → state machine {sync, restart, verify} against the target.

use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;

use crate::Context;
use crate::cli::DeployArgs;
use crate::config;
use crate::engine::executor::{self, DeployOptions};
use crate::engine::planner::DeployPlan;
use crate::git::GitRepo;
use crate::remote::RemoteHost;
use crate::schema::SkiffConfig;
use crate::state::SkiffState;
use crate::ui;

const DEFAULT_COMMIT_MESSAGE: &str = "deploy: update";

/// Show what a deploy would sync and run, with no side effects at all
pub fn plan(_ctx: &Context) -> Result<()> {
    let config_dir = config::config_dir()?;
    let (config, _format) = config::load_config::<SkiffConfig>(&config_dir, "config")
        .context("Could not load skiff config")?;
    config.validate().context("Invalid skiff config")?;

    let root = std::env::current_dir().context("Could not determine working directory")?;
    let plan = DeployPlan::from_config(&config, &root)?;

    ui::header(&format!(
        "Plan → {}@{}",
        config.target.user, config.target.host
    ));
    ui::section("Would sync");
    for line in plan.describe_artifacts() {
        ui::dim(&line);
    }
    ui::section("Would run remotely");
    for cmd in plan
        .prepare_script()
        .iter()
        .chain(plan.promote_script().iter())
        .chain(plan.restart_script().iter())
    {
        ui::dim(cmd);
    }
    println!();
    ui::dim("for the provisioning diff, run 'skiff provision --dry-run' on the target");
    Ok(())
}

pub fn run(ctx: &Context, args: DeployArgs) -> Result<()> {
    let config_dir = config::config_dir()?;
    let (config, _format) = config::load_config::<SkiffConfig>(&config_dir, "config")
        .context("Could not load skiff config; run 'skiff config show' for expected locations")?;
    config.validate().context("Invalid skiff config")?;

    // Precondition: the key file must exist before any network operation
    let key = config.key_path();
    if !key.exists() {
        anyhow::bail!(
            "SSH key not found: {}\nNo commit, push, or network call was attempted.",
            key.display()
        );
    }

    ui::header(&format!(
        "Deploy → {}@{}",
        config.target.user, config.target.host
    ));

    let root = std::env::current_dir().context("Could not determine working directory")?;
    let repo = GitRepo::open(&root)?;

    // Stage and commit pending changes; a clean tree is a no-op
    let message = args.message.as_deref().unwrap_or(DEFAULT_COMMIT_MESSAGE);
    if args.dry_run {
        if repo.has_changes()? {
            ui::info(&format!("Would commit pending changes: \"{message}\""));
        } else {
            ui::info("Working tree clean, nothing to commit");
        }
    } else if repo.commit_if_dirty(message)? {
        ui::success(&format!("Committed: \"{message}\""));
    } else {
        ui::info("Working tree clean, nothing to commit");
    }

    // Push, failing loudly when no origin is configured
    if args.no_push {
        ui::dim("Skipping push (--no-push)");
    } else if args.dry_run {
        ui::info("Would push to origin");
    } else {
        repo.push()?;
        ui::success("Pushed to origin");
    }

    let plan = DeployPlan::from_config(&config, &root)?;
    println!(
        "  {} file(s) to sync to {}",
        plan.artifacts.len().to_string().bold(),
        config.target.app_dir
    );

    if !args.yes && !args.dry_run {
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(format!("Deploy to {}?", config.target.host))
            .default(true)
            .interact()
            .context("Failed to read confirmation")?;
        if !confirmed {
            ui::warn("Deploy aborted");
            return Ok(());
        }
    }

    let remote = RemoteHost::from_target(&config.target, key);
    let opts = DeployOptions {
        dry_run: args.dry_run,
        retries: config.health.retries,
        delay_secs: config.health.delay_secs,
        health_url: config.health.url.clone(),
    };

    let outcome = executor::run_deploy(&plan, &remote, &opts)?;

    if args.dry_run {
        return Ok(());
    }

    // Record what shipped
    let mut state = SkiffState::load().unwrap_or_default();
    state.record_deploy(
        &config.target.host,
        repo.head_short().ok(),
        outcome.files_synced,
        outcome.verified,
    );
    state.save()?;

    println!();
    ui::success(&format!(
        "Deployed {} file(s) to {}",
        outcome.files_synced, config.target.host
    ));
    if ctx.verbose > 0 {
        if let Ok(commit) = repo.head_short() {
            ui::kv("commit", &commit);
        }
        ui::kv("verified", if outcome.verified { "yes" } else { "no" });
    }

    Ok(())
}
