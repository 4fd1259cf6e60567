use eyre::Result;

use crate::{
    config::{AssembleConfig, Workspace},
    external::{self, Tool},
    fastx::{self, LongestReads, SeqFormat},
    stage::ReadSet,
};

fn required<'a>(tool: &'a Option<Tool>, name: &str) -> Result<&'a Tool> {
    tool.as_ref()
        .ok_or_else(|| eyre::eyre!("{name} is required but was not resolved"))
}

/// Remove adapters with porechop, discarding reads with middle adapters.
pub fn trim_adapters(config: &AssembleConfig, ws: &Workspace, reads: &ReadSet) -> Result<ReadSet> {
    let porechop = required(&config.tools.porechop, "porechop")?;
    let trimmed = reads.sibling(ws, &config.prefix, "_trimmed");
    let cmd = external::porechop(
        porechop,
        config.threads,
        &reads.path,
        &trimmed.path,
        reads.format,
    );
    external::run(porechop, cmd, ws.log_file())?;
    Ok(trimmed)
}

/// Correct the longest reads, as chosen by `select`, against the whole read
/// set.
///
/// The longest reads are overlapped against every read, corrected by racon
/// and joined back with the untouched shorter reads. FASTQ read sets get mock
/// qualities on the corrected reads so the result keeps a single format.
pub fn error_correct(
    config: &AssembleConfig,
    ws: &Workspace,
    reads: &ReadSet,
    select: LongestReads,
) -> Result<ReadSet> {
    let prefix = &config.prefix;
    let tools = &config.tools;

    let longest = reads.sibling(ws, prefix, "_longest");
    let others = reads.sibling(ws, prefix, "_others");
    let (n_long, n_other) =
        fastx::partition_longest(&reads.path, reads.format, select, &longest.path, &others.path)?;
    log::info!("Correcting {n_long} reads, leaving {n_other} as is");

    let overlaps = ws.path(format!("{prefix}_longest_ava.paf"));
    let cmd = external::minimap2_overlap(&tools.minimap2, config.threads, &longest.path, &reads.path);
    external::run_to_file(&tools.minimap2, cmd, &overlaps, ws.log_file())?;

    let corrected_fasta = ws.path(format!("{prefix}_longest_corrected.fasta"));
    let cmd = external::racon_correct(
        &tools.racon,
        config.threads,
        &config.racon_opts,
        &reads.path,
        &overlaps,
        &longest.path,
    );
    external::run_to_file(&tools.racon, cmd, &corrected_fasta, ws.log_file())?;

    let corrected_long = match reads.format {
        SeqFormat::Fastq => {
            let fastq = reads.sibling(ws, prefix, "_longest_corrected");
            fastx::mock_qualities(&corrected_fasta, SeqFormat::Fasta, &fastq.path, config.mock_q)?;
            fastq.path
        }
        SeqFormat::Fasta => corrected_fasta,
    };

    let corrected = reads.sibling(ws, prefix, "_corrected");
    fastx::cat(&[&corrected_long, &others.path], &corrected.path)?;
    Ok(corrected)
}
