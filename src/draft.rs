use std::path::PathBuf;

use eyre::Result;

use crate::{
    config::{AssembleConfig, Workspace},
    external,
    fastx,
    stage::ReadSet,
};

/// Produce the seed sequences for polishing: the reference when one was
/// given, otherwise a de novo miniasm assembly of the reads.
pub fn build_draft(config: &AssembleConfig, ws: &Workspace, reads: &ReadSet) -> Result<PathBuf> {
    match config.reference {
        Some(ref reference) => {
            log::info!("Using {} as the draft", reference.display());
            Ok(reference.clone())
        }
        None => assemble_de_novo(config, ws, reads),
    }
}

fn assemble_de_novo(config: &AssembleConfig, ws: &Workspace, reads: &ReadSet) -> Result<PathBuf> {
    let prefix = &config.prefix;
    let tools = &config.tools;
    let miniasm = tools
        .miniasm
        .as_ref()
        .ok_or_else(|| eyre::eyre!("miniasm is required for de novo assembly"))?;

    let overlaps = ws.path(format!("{prefix}.paf"));
    let cmd = external::minimap2_overlap(&tools.minimap2, config.threads, &reads.path, &reads.path);
    external::run_to_file(&tools.minimap2, cmd, &overlaps, ws.log_file())?;

    let gfa = ws.path(format!("{prefix}.gfa"));
    let cmd = external::miniasm(miniasm, &reads.path, &overlaps);
    external::run_to_file(miniasm, cmd, &gfa, ws.log_file())?;

    let draft = ws.path(format!("{prefix}_draft.fa"));
    let n_segments = fastx::gfa_segments_to_fasta(&gfa, &draft)?;
    log::info!("Draft assembly has {n_segments} segments");
    Ok(draft)
}
