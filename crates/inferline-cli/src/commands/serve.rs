use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::Args;
use inferline_runtime::{TriggerParams, TriggerPool};

use crate::context::CliContext;
use crate::{print_err, print_info, print_success, print_warn};

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Directory of `*.json` trigger jobs.
    #[arg(long)]
    pub jobs: PathBuf,
    /// Overrides the configured number of workers.
    #[arg(long)]
    pub workers: Option<usize>,
}

pub fn handle_command(args: ServeArgs, context: &CliContext) -> anyhow::Result<()> {
    let jobs = load_jobs(&args.jobs)?;
    if jobs.is_empty() {
        print_warn!("No trigger jobs found in {}", args.jobs.display());
        return Ok(());
    }

    let workers = args.workers.unwrap_or(context.config().workflow.workers);
    print_info!("Running {} triggers on {workers} workers", jobs.len());
    let pool = TriggerPool::new(workers, context.activity()?, context.executor());

    let handles = jobs
        .into_iter()
        .map(|params| pool.submit(params, context.token()))
        .collect::<Result<Vec<_>, _>>()?;

    let mut failures = 0;
    for handle in handles {
        let trigger_id = handle.trigger_id();
        match handle.join() {
            Ok(run) => print_success!(
                "Trigger {trigger_id} completed: {}",
                run.output_reference.unwrap_or_default()
            ),
            Err(e) => {
                failures += 1;
                print_err!("Trigger {trigger_id} failed: {e}");
            }
        }
    }
    pool.shutdown();

    if failures > 0 {
        anyhow::bail!("{failures} triggers failed");
    }
    Ok(())
}

/// Reads every `*.json` file of `dir` as trigger parameters, in file name order.
fn load_jobs(dir: &Path) -> anyhow::Result<Vec<TriggerParams>> {
    let mut paths = fs::read_dir(dir)
        .with_context(|| format!("Failed to read jobs directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect::<Vec<_>>();
    paths.sort();

    paths
        .iter()
        .map(|path| {
            let contents = fs::read(path)
                .with_context(|| format!("Failed to read job {}", path.display()))?;
            serde_json::from_slice(&contents)
                .with_context(|| format!("Invalid trigger job {}", path.display()))
        })
        .collect()
}
