//! Assembly pipeline: stage reads, optionally trim and correct them, build a
//! draft, polish it over every shuffle replicate and merge the replicates.

use std::path::PathBuf;

use eyre::Result;

use crate::{
    combine,
    config::{AssembleConfig, Workspace},
    draft, polish, preprocess, stage,
    utils::wrap_cmd,
};

/// Run every stage in order and return the path of `{prefix}_final.fa`.
pub fn run(config: &AssembleConfig, ws: &Workspace) -> Result<PathBuf> {
    log::info!("{config:?}");

    let mut reads = wrap_cmd("Staging reads", || stage::stage_reads(config, ws))?;

    if config.trim_adapters {
        reads = wrap_cmd("Trimming adapters with porechop", || {
            preprocess::trim_adapters(config, ws, &reads)
        })?;
    }

    if let Some(select) = config.error_correct {
        reads = wrap_cmd(format!("Error correcting {select}"), || {
            preprocess::error_correct(config, ws, &reads, select)
        })?;
    }

    let draft_msg = if config.is_de_novo() {
        "Building draft assembly with miniasm"
    } else {
        "Using reference as draft"
    };
    let draft = wrap_cmd(draft_msg, || draft::build_draft(config, ws, &reads))?;

    let scaffolds = wrap_cmd(
        format!(
            "Polishing with racon, {} round(s) x {} replicate(s)",
            config.rounds, config.shuffles
        ),
        || polish::polish_all(config, ws, &reads, &draft),
    )?;

    let final_path = wrap_cmd("Combining replicates", || {
        combine::combine(config, ws, &draft, &scaffolds)
    })?;
    log::info!("Final assembly written to {}", final_path.display());
    Ok(final_path)
}
