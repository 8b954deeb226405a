use clap::Args;
use inferline_runtime::bootstrap_models;

use crate::context::CliContext;
use crate::{print_err, print_success};

#[derive(Args, Debug)]
pub struct BootstrapArgs {
    /// Models to load. Repeat the flag for several models.
    #[arg(long = "model", required = true)]
    pub models: Vec<String>,
}

pub fn handle_command(args: BootstrapArgs, context: &CliContext) -> anyhow::Result<()> {
    let engine = context.engine()?;
    let report = bootstrap_models(engine.as_ref(), &args.models);

    for model in &report.succeeded {
        print_success!("Loaded {model}");
    }
    for (model, reason) in &report.failed {
        print_err!("Failed to load {model}: {reason}");
    }

    if !report.is_success() {
        anyhow::bail!(
            "{} of {} models failed to load",
            report.failed.len(),
            args.models.len()
        );
    }
    Ok(())
}
