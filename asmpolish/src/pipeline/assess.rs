use std::path::PathBuf;

use clap::Parser;
use libasmpolish::{
    assess,
    config::{AssessConfig, AssessTools, ToolPaths, Workspace},
    utils,
};
use log::LevelFilter;

use crate::file::ValidPathBuf;

#[derive(Parser, Debug)]
pub struct AssessCmd {
    /// Reference sequences the assembly is compared against
    #[clap(short, long)]
    reference: ValidPathBuf,

    /// Assembly to assess
    #[clap(short, long)]
    input: ValidPathBuf,

    /// Split sequences into pieces of at most this many bases before
    /// alignment, 0 aligns them whole
    #[clap(short, long, default_value_t = 100_000)]
    chunk_size: usize,

    /// Threads passed to every external tool
    #[clap(short, long, default_value_t = 1)]
    threads: usize,

    /// Prefix of every output file
    #[clap(short, long, default_value = "assm")]
    prefix: String,

    /// Catalogue errors, also aligns with the tags catalogue_errors needs
    #[clap(short = 'C', long)]
    catalogue: bool,

    /// Directory for the alignment and reports
    #[clap(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Path to minimap2, otherwise searched for on $PATH
    #[clap(long)]
    minimap2_path: Option<PathBuf>,

    /// Path to samtools, otherwise searched for on $PATH
    #[clap(long)]
    samtools_path: Option<PathBuf>,

    /// Path to stats_from_bam, otherwise searched for on $PATH
    #[clap(long)]
    stats_from_bam_path: Option<PathBuf>,

    /// Path to summary_from_stats, otherwise searched for on $PATH
    #[clap(long)]
    summary_from_stats_path: Option<PathBuf>,

    /// Path to catalogue_errors, otherwise searched for on $PATH
    #[clap(long)]
    catalogue_errors_path: Option<PathBuf>,
}

impl AssessCmd {
    fn into_config(self) -> eyre::Result<AssessConfig> {
        let paths = ToolPaths {
            minimap2: self.minimap2_path,
            samtools: self.samtools_path,
            stats_from_bam: self.stats_from_bam_path,
            summary_from_stats: self.summary_from_stats_path,
            catalogue_errors: self.catalogue_errors_path,
            ..Default::default()
        };
        let tools = AssessTools::resolve(&paths, self.catalogue)?;
        Ok(AssessConfig {
            reference: self.reference.into_inner(),
            input: self.input.into_inner(),
            chunk_size: self.chunk_size,
            catalogue: self.catalogue,
            threads: self.threads,
            prefix: self.prefix,
            output_dir: self.output_dir,
            tools,
        })
    }

    pub fn run(self, log_level_filter: LevelFilter) -> eyre::Result<()> {
        let config = self.into_config()?;
        utils::ensure_absent(assess::bam_path(&config))?;

        let ws = Workspace::open(&config.output_dir, &assess::log_name(&config.prefix))?;
        simple_logging::log_to(ws.log_file().try_clone()?, log_level_filter);

        for section in assess::run(&config, &ws)? {
            println!("{section}\n");
        }
        Ok(())
    }
}
