mod assemble;
mod assess;

use clap::Subcommand;
use log::LevelFilter;

use self::{assemble::AssembleCmd, assess::AssessCmd};

#[derive(Subcommand, Debug)]
pub enum PipelineCmds {
    /// Assemble reads with miniasm, or take a reference as the draft, then
    /// polish it with rounds of racon over shuffled read replicates
    MiniAssemble(AssembleCmd),

    /// Align an assembly to a reference and summarise its error rates and
    /// quality scores
    AssessAssembly(AssessCmd),
}

impl PipelineCmds {
    pub fn run(self, log_level_filter: LevelFilter) -> eyre::Result<()> {
        match self {
            PipelineCmds::MiniAssemble(cmd) => cmd.run(log_level_filter),
            PipelineCmds::AssessAssembly(cmd) => cmd.run(log_level_filter),
        }
    }
}
