use std::{
    fs,
    path::{Path, PathBuf},
};

use eyre::Result;

use crate::{
    config::{AssembleConfig, Workspace},
    external,
    fastx::{self, FastxWriter, SeqFormat},
};

pub fn final_name(prefix: &str) -> String {
    format!("{prefix}_final.fa")
}

/// Merge the replicate scaffolds into `{prefix}_final.fa`.
///
/// A single replicate is copied as is. Several replicates are renamed with a
/// `_{replicate}` suffix, pooled and used to polish the original draft once
/// more.
pub fn combine(
    config: &AssembleConfig,
    ws: &Workspace,
    draft: &Path,
    scaffolds: &[PathBuf],
) -> Result<PathBuf> {
    let prefix = &config.prefix;
    let final_path = ws.path(final_name(prefix));
    match scaffolds {
        [] => Err(eyre::eyre!("No shuffle replicates were polished")),
        [single] => {
            fs::copy(single, &final_path)?;
            Ok(final_path)
        }
        _ => {
            let pooled = pool_replicates(ws, prefix, scaffolds)?;
            let tools = &config.tools;

            let overlaps = ws.path(format!("{prefix}_shuffles.paf"));
            let cmd = external::minimap2_map(&tools.minimap2, config.threads, draft, &pooled);
            external::run_to_file(&tools.minimap2, cmd, &overlaps, ws.log_file())?;

            let cmd = external::racon(
                &tools.racon,
                config.threads,
                &config.racon_opts,
                &pooled,
                &overlaps,
                draft,
            );
            external::run_to_file(&tools.racon, cmd, &final_path, ws.log_file())?;
            Ok(final_path)
        }
    }
}

/// Concatenate replicate scaffolds into `{prefix}_racon_shuffles.fa`, tagging
/// every record with its replicate number.
pub fn pool_replicates(ws: &Workspace, prefix: &str, scaffolds: &[PathBuf]) -> Result<PathBuf> {
    let pooled = ws.path(format!("{prefix}_racon_shuffles.fa"));
    let mut writer = FastxWriter::to_file(&pooled, SeqFormat::Fasta)?;
    for (idx, scaffold) in scaffolds.iter().enumerate() {
        let replicate = idx + 1;
        let n = fastx::rename_records(scaffold, &replicate.to_string(), &mut writer)?;
        log::debug!("Pooled {n} sequences from replicate {replicate}");
    }
    writer.flush()?;
    Ok(pooled)
}
