use clap::Args;

use crate::context::CliContext;
use crate::{print_info, print_warn};

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[arg(long)]
    pub model: String,
    #[arg(long, default_value = "1")]
    pub version: String,
}

pub fn handle_command(args: StatusArgs, context: &CliContext) -> anyhow::Result<()> {
    let readiness = context.engine()?.model_readiness(&args.model, &args.version)?;
    if readiness.is_servable() {
        print_info!("Model {}/{} is {readiness}", args.model, args.version);
    } else {
        print_warn!("Model {}/{} is not serving: {readiness}", args.model, args.version);
    }
    Ok(())
}
