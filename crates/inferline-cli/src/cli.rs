use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use inferline_runtime::InferlineConfig;

use crate::commands;
use crate::context::CliContext;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to the inferline TOML config. Defaults apply when absent.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one inference trigger and store its output.
    Trigger(commands::trigger::TriggerArgs),
    /// Show the readiness of a deployed model.
    Status(commands::status::StatusArgs),
    /// Load a set of models on the engine in parallel.
    Bootstrap(commands::bootstrap::BootstrapArgs),
    /// Run every trigger job file of a directory through the worker pool.
    Serve(commands::serve::ServeArgs),
}

pub fn cli_main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let config = InferlineConfig::load(args.config.as_deref()).context("Failed to load config")?;
    let context = CliContext::new(config);

    match args.command {
        Commands::Trigger(args) => commands::trigger::handle_command(args, &context),
        Commands::Status(args) => commands::status::handle_command(args, &context),
        Commands::Bootstrap(args) => commands::bootstrap::handle_command(args, &context),
        Commands::Serve(args) => commands::serve::handle_command(args, &context),
    }
}
