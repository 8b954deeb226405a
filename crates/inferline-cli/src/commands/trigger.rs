use std::fs;
use std::path::PathBuf;

use anyhow::Context as _;
use clap::Args;
use inferline_core::{InferInput, Task};
use inferline_runtime::storage::APPLICATION_JSON;
use inferline_runtime::{ObjectStorage, RunSource, TriggerParams};
use uuid::Uuid;

use crate::context::CliContext;
use crate::{print_info, print_success};

#[derive(Args, Debug)]
pub struct TriggerArgs {
    /// Model to run.
    #[arg(long)]
    pub model: String,
    #[arg(long, default_value = "1")]
    pub version: String,
    /// Task the model serves, e.g. DETECTION or TEXT_GENERATION.
    #[arg(long)]
    pub task: Task,
    /// JSON file holding the trigger input.
    #[arg(long)]
    pub input: PathBuf,
    #[arg(long, default_value = "CPU")]
    pub hardware: String,
    #[arg(long, default_value = "local")]
    pub requester: String,
    /// Reuse an id to re-run a previous trigger.
    #[arg(long)]
    pub trigger_id: Option<Uuid>,
}

pub fn handle_command(args: TriggerArgs, context: &CliContext) -> anyhow::Result<()> {
    let payload = fs::read(&args.input)
        .with_context(|| format!("Failed to read input {}", args.input.display()))?;
    let input = InferInput::from_json(&payload).context("Invalid trigger input")?;
    if input.task() != args.task {
        anyhow::bail!("Input is for {}, but --task is {}", input.task(), args.task);
    }

    let trigger_id = args.trigger_id.unwrap_or_else(Uuid::new_v4);
    let activity = context.activity()?;
    let input_reference = input_key(&args.model, trigger_id);
    activity
        .collaborators()
        .storage
        .put_object(&input_reference, &payload, APPLICATION_JSON)
        .context("Failed to store trigger input")?;

    let params = TriggerParams {
        trigger_id,
        model_id: args.model,
        model_version: args.version,
        task: args.task,
        input_reference,
        requester_id: args.requester,
        hardware: args.hardware,
        source: RunSource::Console,
    };
    print_info!("Running trigger {trigger_id}");

    let run = context
        .executor()
        .run_trigger(&activity, &params, &context.token())?;
    print_success!(
        "Trigger {} completed in {}ms, output stored at {}",
        run.id,
        run.total_duration_ms.unwrap_or_default(),
        run.output_reference.unwrap_or_default()
    );
    Ok(())
}

fn input_key(model: &str, trigger_id: Uuid) -> String {
    format!("inputs/{model}/{trigger_id}.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        args: TriggerArgs,
    }

    #[test]
    fn test_parse_task_flag() {
        let cli = Cli::try_parse_from([
            "inferline",
            "--model",
            "yolo",
            "--task",
            "detection",
            "--input",
            "input.json",
        ])
        .unwrap();

        assert_eq!(cli.args.task, Task::Detection);
        assert_eq!(cli.args.version, "1");
        assert_eq!(cli.args.hardware, "CPU");
        assert!(cli.args.trigger_id.is_none());
    }

    #[test]
    fn test_input_key() {
        let id = Uuid::nil();
        assert_eq!(
            input_key("yolo", id),
            "inputs/yolo/00000000-0000-0000-0000-000000000000.json"
        );
    }
}
