//! Config command - show, validate, and locate the skiff configuration

use anyhow::{Context as AnyhowContext, Result};

use crate::Context;
use crate::cli::ConfigCommand;
use crate::config::{self, ConfigFormat};
use crate::schema::SkiffConfig;
use crate::ui;

pub fn run(_ctx: &Context, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => show(),
        ConfigCommand::Validate => validate(),
        ConfigCommand::Dir => dir(),
    }
}

fn show() -> Result<()> {
    let config_dir = config::config_dir()?;
    let (config, format) = config::load_config::<SkiffConfig>(&config_dir, "config")
        .with_context(|| {
            format!(
                "No config found: create {}/config.toml (or config.json)",
                config_dir.display()
            )
        })?;

    // Re-serialize so defaults show up too
    let rendered = match format {
        ConfigFormat::Toml => toml::to_string_pretty(&config)?,
        ConfigFormat::Json => serde_json::to_string_pretty(&config)?,
    };
    println!("{rendered}");
    Ok(())
}

fn validate() -> Result<()> {
    let config_dir = config::config_dir()?;
    let (config, _format) = config::load_config::<SkiffConfig>(&config_dir, "config")?;
    config.validate()?;
    ui::success("Config is valid");
    ui::kv("target", &format!("{}@{}", config.target.user, config.target.host));
    ui::kv("service", &config.target.service);
    ui::kv(
        "manifest",
        &format!(
            "{} file(s), {} tree(s)",
            config.manifest.files.len(),
            config.manifest.trees.len()
        ),
    );
    Ok(())
}

fn dir() -> Result<()> {
    println!("{}", config::config_dir()?.display());
    Ok(())
}
