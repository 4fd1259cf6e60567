mod file;
mod pipeline;

use std::process;

use clap::{ArgAction, Parser};
use eyre::Result;
use human_panic::setup_panic;
use libasmpolish::error;
use log::LevelFilter;
use pipeline::PipelineCmds;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about=None)]
/// Long read draft assembly, racon polishing and assembly assessment.
struct Args {
    /// Log more detail to the run log, -vv for everything
    #[clap(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[clap(subcommand)]
    command: PipelineCmds,
}

impl Args {
    fn log_level_filter(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

fn main() -> Result<()> {
    setup_panic!();
    jane_eyre::install()?;

    // Usage errors exit with 1, help and version with 0
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            e.print()?;
            process::exit(code);
        }
    };
    let log_level_filter = args.log_level_filter();

    if let Err(report) = args.command.run(log_level_filter) {
        eprintln!("Error: {report:?}");
        process::exit(error::exit_code(&report));
    }
    Ok(())
}
