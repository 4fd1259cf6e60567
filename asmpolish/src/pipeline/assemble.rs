use std::path::PathBuf;

use clap::Parser;
use libasmpolish::{
    assemble,
    config::{AssembleConfig, AssembleTools, RaconOpts, ToolPaths, Workspace, DEFAULT_MOCK_Q},
    fastx::LongestReads,
    utils,
};
use log::LevelFilter;

use crate::file::ValidPathBuf;

/// Name of the run log inside the output directory.
const LOG_NAME: &str = "log.txt";

#[derive(Parser, Debug)]
pub struct AssembleCmd {
    /// Reads to assemble, FASTA or FASTQ, or a directory of fastq files
    #[clap(short, long)]
    input: ValidPathBuf,

    /// Keep the qualities of FASTQ input instead of replacing them with a
    /// mock value
    #[clap(short = 'q', long)]
    keep_qualities: bool,

    /// Polish this reference instead of building a de novo draft
    #[clap(short, long)]
    reference: Option<ValidPathBuf>,

    /// Output directory, must not exist yet
    #[clap(short, long, default_value = "assm")]
    output_dir: PathBuf,

    /// Prefix of every output file
    #[clap(short, long, default_value = "reads")]
    prefix: String,

    /// Threads passed to every external tool
    #[clap(short, long, default_value_t = 1)]
    threads: usize,

    /// Rounds of racon polishing per replicate
    #[clap(short = 'm', long, default_value_t = 4)]
    rounds: usize,

    /// Number of read shuffles to polish with, replicates are merged at the
    /// end
    #[clap(short = 'n', long, default_value_t = 1)]
    shuffles: usize,

    /// Trim adapters with porechop before assembly
    #[clap(short = 'c', long)]
    trim_adapters: bool,

    /// Error correct the longest PCT percent of reads before assembly
    #[clap(short = 'e', long, value_name = "PCT")]
    error_correct: Option<f64>,

    /// Error correct the longest reads totalling at most BASES bases (at
    /// least one read) before assembly
    #[clap(long, value_name = "BASES", conflicts_with = "error_correct")]
    error_correct_bases: Option<u64>,

    /// Number of shuffle replicates polished at the same time
    #[clap(short, long, default_value_t = 1)]
    jobs: usize,

    /// Quality value given to every base when qualities are replaced
    #[clap(long, default_value_t = DEFAULT_MOCK_Q)]
    mock_q: u8,

    /// Path to minimap2, otherwise searched for on $PATH
    #[clap(long)]
    minimap2_path: Option<PathBuf>,

    /// Path to racon, otherwise searched for on $PATH
    #[clap(long)]
    racon_path: Option<PathBuf>,

    /// Path to miniasm, otherwise searched for on $PATH
    #[clap(long)]
    miniasm_path: Option<PathBuf>,

    /// Path to porechop, otherwise searched for on $PATH
    #[clap(long)]
    porechop_path: Option<PathBuf>,

    /// Path to seqkit, otherwise searched for on $PATH
    #[clap(long)]
    seqkit_path: Option<PathBuf>,
}

impl AssembleCmd {
    fn tool_paths(&self) -> ToolPaths {
        ToolPaths {
            minimap2: self.minimap2_path.clone(),
            racon: self.racon_path.clone(),
            miniasm: self.miniasm_path.clone(),
            porechop: self.porechop_path.clone(),
            seqkit: self.seqkit_path.clone(),
            ..Default::default()
        }
    }

    fn into_config(self) -> eyre::Result<AssembleConfig> {
        let tools = AssembleTools::resolve(
            &self.tool_paths(),
            self.reference.is_none(),
            self.trim_adapters,
            self.shuffles,
        )?;
        Ok(AssembleConfig {
            input: self.input.into_inner(),
            keep_qualities: self.keep_qualities,
            reference: self.reference.map(ValidPathBuf::into_inner),
            output_dir: self.output_dir,
            prefix: self.prefix,
            threads: self.threads,
            rounds: self.rounds,
            shuffles: self.shuffles,
            trim_adapters: self.trim_adapters,
            error_correct: self
                .error_correct
                .map(LongestReads::Percent)
                .or(self.error_correct_bases.map(LongestReads::Bases)),
            jobs: self.jobs,
            mock_q: self.mock_q,
            racon_opts: RaconOpts::from_env(),
            tools,
        })
    }

    pub fn run(self, log_level_filter: LevelFilter) -> eyre::Result<()> {
        utils::ensure_absent(&self.output_dir)?;
        let config = self.into_config()?;

        let ws = Workspace::create(&config.output_dir, LOG_NAME)?;
        simple_logging::log_to(ws.log_file().try_clone()?, log_level_filter);

        let final_path = assemble::run(&config, &ws)?;
        println!("Final polished assembly: {}", final_path.display());
        Ok(())
    }
}
