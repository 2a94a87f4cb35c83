mod cli;
mod commands;
mod config;
mod engine;
mod git;
mod progress;
mod remote;
mod resource;
mod runner;
mod schema;
mod secret;
mod state;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};

use cli::{Cli, Command};

/// Shared invocation context passed to every command
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
}

fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    if let Err(e) = dispatch(&ctx, cli.command) {
        ui::error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

fn dispatch(ctx: &Context, command: Command) -> Result<()> {
    match command {
        Command::Deploy(args) => commands::deploy::run(ctx, args),
        Command::Provision(args) => commands::provision::run(ctx, args),
        Command::Status => commands::status::run(ctx),
        Command::Plan => commands::deploy::plan(ctx),
        Command::Bundle(args) => commands::bundle::run(ctx, args),
        Command::Doctor => commands::doctor::run(ctx),
        Command::Config { command } => commands::config::run(ctx, command),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
            Ok(())
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}
