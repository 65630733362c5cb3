use std::process::ExitCode;

use clap::Parser;
use console::style;

use ticketrank::cli::{run, Cli};
use ticketrank::observability::init_logging;

fn main() -> ExitCode {
    init_logging();
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {e}", style("error:").red().bold());
            ExitCode::FAILURE
        }
    }
}
