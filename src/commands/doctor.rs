//! Doctor command - diagnose the operator environment before it bites
//!
//! Checks the local toolchain, the config file, the SSH key, and the state
//! directory. Each problem is reported with a concrete fix.

use anyhow::Result;
use colored::Colorize;

use crate::Context;
use crate::config;
use crate::runner;
use crate::schema::SkiffConfig;
use crate::state::SkiffState;
use crate::ui;

/// A detected problem with a suggested fix
struct Issue {
    category: &'static str,
    summary: String,
    detail: Option<String>,
    fix: Option<String>,
    fix_cmd: Option<String>,
}

pub fn run(ctx: &Context) -> Result<()> {
    ui::header("Doctor");

    let mut issues: Vec<Issue> = Vec::new();
    let mut checks = 0usize;

    // Local toolchain skiff shells out to
    for tool in ["git", "ssh", "scp", "tar"] {
        checks += 1;
        if runner::command_exists(tool) {
            if ctx.verbose > 0 {
                ui::success(&format!("{tool} found"));
            }
        } else {
            issues.push(Issue {
                category: "toolchain",
                summary: format!("{tool} not found in PATH"),
                detail: None,
                fix: Some(format!("Install {tool} with your package manager")),
                fix_cmd: None,
            });
        }
    }

    // Config presence, parse, and semantic validation
    checks += 1;
    let config_dir = config::config_dir()?;
    match config::load_config::<SkiffConfig>(&config_dir, "config") {
        Ok((config, _format)) => {
            if ctx.verbose > 0 {
                ui::success(&format!("config loaded from {}", config_dir.display()));
            }
            checks += 1;
            if let Err(e) = config.validate() {
                issues.push(Issue {
                    category: "config",
                    summary: "Config fails validation".to_string(),
                    detail: Some(e.to_string()),
                    fix: Some("Edit the config and re-run".to_string()),
                    fix_cmd: Some("skiff config validate".to_string()),
                });
            }

            checks += 1;
            let key = config.key_path();
            if !key.exists() {
                issues.push(Issue {
                    category: "ssh",
                    summary: format!("SSH key not found: {}", key.display()),
                    detail: Some(
                        "Deploy refuses to start without the key file".to_string(),
                    ),
                    fix: Some("Point target.key_file at an existing private key".to_string()),
                    fix_cmd: None,
                });
            } else {
                if ctx.verbose > 0 {
                    ui::success(&format!("ssh key present: {}", key.display()));
                }
                checks += 1;
                if let Some(mode) = key_mode(&key) {
                    if mode & 0o077 != 0 {
                        issues.push(Issue {
                            category: "ssh",
                            summary: format!(
                                "SSH key {} is group/world readable (mode {mode:o})",
                                key.display()
                            ),
                            detail: Some("ssh refuses keys with loose permissions".to_string()),
                            fix: Some("Restrict the key to the owner".to_string()),
                            fix_cmd: Some(format!("chmod 600 {}", key.display())),
                        });
                    }
                }
            }
        }
        Err(e) => {
            issues.push(Issue {
                category: "config",
                summary: format!("Could not load config from {}", config_dir.display()),
                detail: Some(format!("{e:#}")),
                fix: Some(format!(
                    "Create {}/config.toml with a [target] section",
                    config_dir.display()
                )),
                fix_cmd: None,
            });
        }
    }

    // State directory must be creatable for deploy records
    checks += 1;
    match SkiffState::state_dir() {
        Ok(dir) => {
            if let Err(e) = std::fs::create_dir_all(&dir) {
                issues.push(Issue {
                    category: "state",
                    summary: format!("Cannot create state dir {}", dir.display()),
                    detail: Some(e.to_string()),
                    fix: None,
                    fix_cmd: None,
                });
            } else if ctx.verbose > 0 {
                ui::success(&format!("state dir writable: {}", dir.display()));
            }
        }
        Err(e) => {
            issues.push(Issue {
                category: "state",
                summary: "Cannot resolve state dir".to_string(),
                detail: Some(format!("{e:#}")),
                fix: None,
                fix_cmd: None,
            });
        }
    }

    print_issue_summary(checks, &issues);

    if issues.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("{} issue(s) found", issues.len())
    }
}

fn key_mode(path: &std::path::Path) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .ok()
        .map(|m| m.permissions().mode() & 0o7777)
}

fn print_issue_summary(checks: usize, issues: &[Issue]) {
    println!();
    if issues.is_empty() {
        println!(
            "  {} All {} checks passed",
            "✓".green().bold(),
            checks
        );
        return;
    }

    println!(
        "  {} {} of {} checks found problems",
        "⚠".yellow().bold(),
        issues.len(),
        checks
    );

    for issue in issues {
        println!();
        println!(
            "  {} {} {}",
            "✗".red(),
            format!("[{}]", issue.category).dimmed(),
            issue.summary
        );
        if let Some(detail) = &issue.detail {
            for line in detail.lines() {
                println!("      {}", line.dimmed());
            }
        }
    }

    let fixes: Vec<&Issue> = issues
        .iter()
        .filter(|i| i.fix.is_some() || i.fix_cmd.is_some())
        .collect();
    if !fixes.is_empty() {
        ui::section("Quick Fixes");
        for issue in fixes {
            if let Some(fix) = &issue.fix {
                println!("  • {}", fix);
            }
            if let Some(cmd) = &issue.fix_cmd {
                println!("      {}", cmd.cyan());
            }
        }
    }
}
