mod cli;
mod commands;
mod context;
mod logging;

use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match cli::cli_main() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            print_err!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
