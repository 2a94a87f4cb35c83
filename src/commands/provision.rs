//! Provision command - turn a bare machine into a running instance
//!
//! Runs on the target host itself, as root. Builds an ordered resource plan
//! (packages → user → code → venv → config → ownership → unit → service),
//! shows the diff, and applies it sequentially with strict fail-fast.

use anyhow::{Context as AnyhowContext, Result};
use std::path::{Path, PathBuf};

use crate::Context;
use crate::cli::ProvisionArgs;
use crate::config;
use crate::engine::executor::{self, ProvisionOptions};
use crate::engine::planner::ProvisionPlan;
use crate::resource::{
    CodeCopy, ConfigFile, Directory, OsFamily, OsPackage, SystemUser, SystemdService, SystemdUnit,
    Virtualenv, config_file::render_server_config, systemd_unit::UnitSpec,
    virtualenv::InstallMode,
};
use crate::runner;
use crate::schema::SkiffConfig;
use crate::secret;
use crate::state::SkiffState;
use crate::ui;

pub fn run(ctx: &Context, args: ProvisionArgs) -> Result<()> {
    if !ctx.quiet {
        ui::banner();
    }
    ui::header("Remote Provisioner");

    let config_dir = config::config_dir()?;
    let (config, _format) = config::load_config::<SkiffConfig>(&config_dir, "config")
        .context("Could not load skiff config")?;
    config.validate().context("Invalid skiff config")?;

    // Fatal preconditions, checked before any package installation
    let family = OsFamily::detect()?;
    ui::kv("os family", family.name());

    if !args.dry_run && !running_as_root() {
        anyhow::bail!("Provisioning needs root; re-run with sudo");
    }

    let code_dir = args
        .code_dir
        .unwrap_or_else(|| PathBuf::from(shellexpand::tilde(&config.provision.code_dir).as_ref()));
    ui::kv("code dir", &code_dir.display().to_string());

    let cache = under_app(&config.target.app_dir, &config.provision.package_cache);
    let mode = InstallMode::select(&cache);
    ui::kv(
        "pip mode",
        match mode {
            InstallMode::Offline => "offline (package cache present)",
            InstallMode::Online => "online",
        },
    );

    let rotated_secret = secret::generate();
    let plan = build_plan(&config, family, &code_dir, &rotated_secret)?;

    let opts = ProvisionOptions {
        dry_run: args.dry_run,
        yes: args.yes,
        verbose: ctx.verbose > 0,
    };

    let summary = executor::run_provision(&plan, &opts)?;

    if !summary.is_success() {
        anyhow::bail!("{} resource(s) failed to apply", summary.failed);
    }

    if !args.dry_run && summary.total_changes() > 0 {
        // The unit carries a fresh secret on every run; say so out loud
        ui::warn(&format!(
            "Runtime secret rotated ({} in the service unit); existing sessions are invalidated",
            config.service.secret_env
        ));

        let mut state = SkiffState::load().unwrap_or_default();
        state.record_provision(&config.target.host, summary.total_changes());
        state.save()?;
    }

    Ok(())
}

fn running_as_root() -> bool {
    runner::run_capture("id", &["-u"])
        .map(|uid| uid.trim() == "0")
        .unwrap_or(false)
}

/// Resolve a config path against the app dir unless it is already absolute
fn under_app(app_dir: &str, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        Path::new(app_dir).join(p)
    }
}

fn build_plan(
    config: &SkiffConfig,
    family: OsFamily,
    code_dir: &Path,
    rotated_secret: &str,
) -> Result<ProvisionPlan> {
    let mut plan = ProvisionPlan::new();
    let app_dir = &config.target.app_dir;

    // Packages first; the venv build depends on them
    let mut packages = config.provision.packages.clone();
    if family == OsFamily::Debian && !packages.iter().any(|p| p == "python3-venv") {
        packages.push("python3-venv".to_string());
    }
    for package in &packages {
        plan.add(Box::new(OsPackage::new(package, family)));
    }

    // Execution identity
    plan.add(Box::new(SystemUser::new(&config.service.run_user, app_dir)));

    // Code lands before ownership is asserted
    for artifact in config.manifest.expand(code_dir)? {
        plan.add(Box::new(CodeCopy::new(
            artifact.source,
            under_app(app_dir, &artifact.target),
        )));
    }

    // Dependency environment (mode decided by package cache presence)
    plan.add(Box::new(Virtualenv::new(
        under_app(app_dir, &config.provision.venv_dir),
        under_app(app_dir, &config.provision.requirements),
        under_app(app_dir, &config.provision.package_cache),
    )));

    // Runtime configuration file
    plan.add(Box::new(ConfigFile::new(
        under_app(app_dir, &config.service.config_path),
        render_server_config(config.target.port, &config.service.bind_address),
    )));

    // Ownership over everything copied/built above, then the locked-down
    // credentials directory
    plan.add(Box::new(
        Directory::new(PathBuf::from(app_dir)).owned_by(&config.service.run_user),
    ));
    plan.add(Box::new(
        Directory::new(under_app(app_dir, &config.service.credentials_dir))
            .owned_by(&config.service.run_user)
            .with_mode(0o700),
    ));

    // Supervisor unit with the rotated secret, then the service itself
    let mut env: Vec<(String, String)> = config
        .service
        .env
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    env.push((config.service.secret_env.clone(), rotated_secret.to_string()));

    let unit_spec = UnitSpec {
        service_name: config.target.service.clone(),
        app_dir: app_dir.clone(),
        run_user: config.service.run_user.clone(),
        exec_start: config.service.exec_start.clone(),
        restart: config.service.restart.clone(),
        env,
    };
    plan.add(Box::new(SystemdUnit::new(
        PathBuf::from(format!(
            "/etc/systemd/system/{}.service",
            config.target.service
        )),
        &unit_spec,
    )));
    plan.add(Box::new(SystemdService::new(&config.target.service)));

    Ok(plan)
}
