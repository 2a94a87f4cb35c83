//! Status command - what skiff last did, and what the target says now

use anyhow::{Context as AnyhowContext, Result};
use chrono::{DateTime, Utc};

use crate::Context;
use crate::config;
use crate::remote::RemoteHost;
use crate::schema::SkiffConfig;
use crate::state::SkiffState;
use crate::ui;

pub fn run(ctx: &Context) -> Result<()> {
    let config_dir = config::config_dir()?;
    let (config, _format) = config::load_config::<SkiffConfig>(&config_dir, "config")
        .context("Could not load skiff config")?;
    config.validate().context("Invalid skiff config")?;

    ui::header(&format!("Status: {}", config.target.host));

    let state = SkiffState::load().unwrap_or_default();

    ui::section("Last deploy");
    match &state.deploy {
        Some(record) => {
            ui::kv("when", &humanize(record.at));
            ui::kv("host", &record.host);
            if let Some(commit) = &record.commit {
                ui::kv("commit", commit);
            }
            ui::kv("files synced", &record.files_synced.to_string());
            ui::kv("verified", if record.verified { "yes" } else { "no" });
        }
        None => ui::dim("never"),
    }

    ui::section("Last provision");
    match &state.provision {
        Some(record) => {
            ui::kv("when", &humanize(record.at));
            ui::kv("host", &record.host);
            ui::kv("resources applied", &record.resources_applied.to_string());
            if record.secret_rotated {
                ui::kv("secret", "rotated on that run");
            }
        }
        None => ui::dim("never"),
    }

    // Live probe only when we can actually reach the box
    let key = config.key_path();
    ui::section("Remote service");
    if key.exists() {
        let remote = RemoteHost::from_target(&config.target, key);
        if remote.is_active(&config.target.service) {
            ui::success(&format!("{} is active", config.target.service));
        } else {
            ui::warn(&format!(
                "{} is not active; inspect with: journalctl -u {} -n 50",
                config.target.service, config.target.service
            ));
        }
        if ctx.verbose > 0 {
            match remote.service_status(&config.target.service) {
                Ok(snippet) => {
                    for line in snippet.lines() {
                        ui::dim(line);
                    }
                }
                Err(e) => ui::dim(&format!("status unavailable: {e:#}")),
            }
        }
    } else {
        ui::dim(&format!(
            "skipped: SSH key not found at {}",
            key.display()
        ));
    }

    Ok(())
}

fn humanize(at: DateTime<Utc>) -> String {
    let elapsed = Utc::now().signed_duration_since(at);
    let human = if elapsed.num_days() > 0 {
        format!("{}d ago", elapsed.num_days())
    } else if elapsed.num_hours() > 0 {
        format!("{}h ago", elapsed.num_hours())
    } else if elapsed.num_minutes() > 0 {
        format!("{}m ago", elapsed.num_minutes())
    } else {
        "just now".to_string()
    };
    format!("{} ({})", at.format("%Y-%m-%d %H:%M UTC"), human)
}
