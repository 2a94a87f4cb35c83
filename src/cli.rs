//! Command-line interface definitions

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "skiff",
    about = "Deploy driver and remote provisioner for small single-host services",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Commit, push, and ship the manifest to the target host
    Deploy(DeployArgs),

    /// Converge a fresh machine into a running service (run on the target, as root)
    Provision(ProvisionArgs),

    /// Show the last deploy/provision records and live service state
    Status,

    /// Show what a deploy would sync and run, without touching anything
    Plan,

    /// Pack the deployment manifest into a tar.gz for air-gapped transfer
    Bundle(BundleArgs),

    /// Diagnose the local environment and configuration
    Doctor,

    /// Inspect and validate the configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct DeployArgs {
    /// Commit message for pending changes (default: "deploy: update")
    pub message: Option<String>,

    /// Show the plan without committing, pushing, or touching the target
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the push to origin
    #[arg(long)]
    pub no_push: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args)]
pub struct ProvisionArgs {
    /// Show the resource diff without applying anything
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Directory to copy application code from (default: provision.code_dir)
    #[arg(long)]
    pub code_dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct BundleArgs {
    /// Output path (default: skiff-bundle.tar.gz)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration, defaults included
    Show,

    /// Check the configuration for semantic errors
    Validate,

    /// Print the configuration directory path
    Dir,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn deploy_accepts_positional_message() {
        let cli = Cli::try_parse_from(["skiff", "deploy", "fix login flow", "--yes"]).unwrap();
        match cli.command {
            Command::Deploy(args) => {
                assert_eq!(args.message.as_deref(), Some("fix login flow"));
                assert!(args.yes);
                assert!(!args.dry_run);
            }
            _ => panic!("expected deploy"),
        }
    }

    #[test]
    fn verbose_flag_counts() {
        let cli = Cli::try_parse_from(["skiff", "-vv", "status"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }
}
