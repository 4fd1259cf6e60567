//! Iterative racon polishing over shuffle replicates.
//!
//! Every replicate is an independent lineage: it owns its read order and its
//! file names, so lineages can run on a thread pool and are only joined
//! again by the combiner.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
};

use eyre::{Context, Result};
use rayon::prelude::*;

use crate::{
    config::{AssembleConfig, Workspace},
    error::PipelineError,
    external,
    stage::ReadSet,
};

/// File name of the scaffold produced by `round` of replicate `shuffle`.
pub fn scaffold_name(prefix: &str, shuffle: usize, round: usize) -> String {
    format!("{prefix}_racon_{shuffle}_{round}.fa")
}

/// Reads used by replicate `shuffle`. With a single replicate the staged
/// reads are used directly; otherwise replicate 1 links to them and later
/// replicates get a seeded shuffle.
fn replicate_reads(
    config: &AssembleConfig,
    ws: &Workspace,
    reads: &ReadSet,
    shuffle: usize,
) -> Result<ReadSet> {
    if config.shuffles <= 1 {
        return Ok(reads.clone());
    }
    let replicate = reads.sibling(ws, &config.prefix, &format!("_shuffle_{shuffle}"));
    if shuffle == 1 {
        let target = fs::canonicalize(&reads.path)?;
        std::os::unix::fs::symlink(&target, &replicate.path).wrap_err_with(|| {
            format!("Failed to link {}", replicate.path.display())
        })?;
    } else {
        let seqkit = config
            .tools
            .seqkit
            .as_ref()
            .ok_or_else(|| eyre::eyre!("seqkit is required to shuffle reads"))?;
        let cmd = external::seqkit_shuffle(seqkit, config.threads, shuffle, &reads.path);
        external::run_to_file(seqkit, cmd, &replicate.path, ws.log_file())?;
    }
    Ok(replicate)
}

/// Run every polishing round of one replicate, returning its final scaffold.
///
/// `abort` is checked before each round; once set, the replicate stops with
/// [`PipelineError::Cancelled`].
pub fn polish_replicate(
    config: &AssembleConfig,
    ws: &Workspace,
    reads: &ReadSet,
    draft: &Path,
    shuffle: usize,
    abort: &AtomicBool,
) -> Result<PathBuf> {
    let prefix = &config.prefix;
    let tools = &config.tools;
    let reads = replicate_reads(config, ws, reads, shuffle)?;

    let mut scaffold = draft.to_path_buf();
    for round in 1..=config.rounds {
        if abort.load(Ordering::SeqCst) {
            log::warn!("Replicate {shuffle}: stopping before round {round}");
            return Err(PipelineError::Cancelled.into());
        }
        log::info!(
            "Replicate {shuffle}: polishing round {round}/{}",
            config.rounds
        );
        let overlaps = ws.path(format!("{prefix}_{shuffle}_{round}.paf"));
        let cmd = external::minimap2_map(&tools.minimap2, config.threads, &scaffold, &reads.path);
        external::run_to_file(&tools.minimap2, cmd, &overlaps, ws.log_file())?;

        let polished = ws.path(scaffold_name(prefix, shuffle, round));
        let cmd = external::racon(
            &tools.racon,
            config.threads,
            &config.racon_opts,
            &reads.path,
            &overlaps,
            &scaffold,
        );
        external::run_to_file(&tools.racon, cmd, &polished, ws.log_file())
            .wrap_err_with(|| format!("Polishing round {round} of replicate {shuffle} failed"))?;
        scaffold = polished;
    }
    Ok(scaffold)
}

/// Polish all replicates, `config.jobs` at a time. Final scaffolds are
/// returned in replicate order; the first failure aborts the run.
pub fn polish_all(
    config: &AssembleConfig,
    ws: &Workspace,
    reads: &ReadSet,
    draft: &Path,
) -> Result<Vec<PathBuf>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.jobs.max(1))
        .build()?;
    log::info!(
        "Polishing {} replicate(s) for {} round(s) using {} job(s)",
        config.shuffles,
        config.rounds,
        config.jobs.max(1)
    );
    let abort = AtomicBool::new(false);
    let results: Vec<Result<PathBuf>> = pool.install(|| {
        (1..=config.shuffles)
            .into_par_iter()
            .map(|shuffle| {
                let result = polish_replicate(config, ws, reads, draft, shuffle, &abort);
                if result.is_err() {
                    abort.store(true, Ordering::SeqCst);
                }
                result
            })
            .collect()
    });

    // Report the failure that triggered the abort, not a replicate it stopped.
    let mut finals = Vec::with_capacity(results.len());
    let mut cancelled = None;
    for result in results {
        match result {
            Ok(scaffold) => finals.push(scaffold),
            Err(e) if is_cancelled(&e) => {
                cancelled.get_or_insert(e);
            }
            Err(e) => return Err(e),
        }
    }
    match cancelled {
        Some(e) => Err(e),
        None => Ok(finals),
    }
}

fn is_cancelled(report: &eyre::Report) -> bool {
    matches!(
        report.downcast_ref::<PipelineError>(),
        Some(PipelineError::Cancelled)
    )
}

#[cfg(test)]
mod test {
    use assert_fs::{prelude::*, TempDir};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{error::exit_code, testing};

    const DRAFT: &str = ">contig\nACGTACGT\n";

    fn setup(temp_dir: &TempDir) -> Result<(AssembleConfig, Workspace, ReadSet, PathBuf)> {
        let input = temp_dir.child("reads.fastq");
        input.write_str("@r1\nACGT\n+\nIIII\n")?;
        let draft = temp_dir.child("draft.fa");
        draft.write_str(DRAFT)?;
        let ws = Workspace::create(temp_dir.path().join("assm"), "log.txt")?;
        let mut config = testing::assemble_config(input.path(), true);
        config.tools = testing::fake_assemble_tools(temp_dir.path())?;
        Ok((config, ws, ReadSet::new(input.path()), draft.to_path_buf()))
    }

    #[test]
    fn test_single_replicate_rounds() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let (mut config, ws, reads, draft) = setup(&temp_dir)?;
        config.rounds = 2;

        let finals = polish_all(&config, &ws, &reads, &draft)?;
        assert_eq!(finals, vec![ws.path("reads_racon_1_2.fa")]);
        assert!(ws.path("reads_racon_1_1.fa").exists());
        assert!(ws.path("reads_1_1.paf").exists());
        assert!(!ws.path("reads_racon_1_3.fa").exists());
        assert!(!ws.path("reads_shuffle_1.fastq").exists());
        assert_eq!(fs::read_to_string(&finals[0])?, DRAFT);
        Ok(())
    }

    #[test]
    fn test_parallel_replicates() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let (mut config, ws, reads, draft) = setup(&temp_dir)?;
        config.rounds = 3;
        config.shuffles = 3;
        config.jobs = 2;

        let finals = polish_all(&config, &ws, &reads, &draft)?;
        let expected: Vec<PathBuf> = (1..=3)
            .map(|k| ws.path(scaffold_name("reads", k, 3)))
            .collect();
        assert_eq!(finals, expected);

        let first = ws.path("reads_shuffle_1.fastq");
        assert!(fs::symlink_metadata(&first)?.file_type().is_symlink());
        assert!(ws.path("reads_shuffle_2.fastq").is_file());
        assert!(ws.path("reads_shuffle_3.fastq").is_file());
        Ok(())
    }

    #[test]
    fn test_zero_rounds_keeps_draft() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let (mut config, ws, reads, draft) = setup(&temp_dir)?;
        config.rounds = 0;
        let finals = polish_all(&config, &ws, &reads, &draft)?;
        assert_eq!(finals, vec![draft]);
        Ok(())
    }

    #[test]
    fn test_failed_round_aborts() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let (mut config, ws, reads, draft) = setup(&temp_dir)?;
        config.tools.racon = testing::fake_tool(temp_dir.path(), "broken_racon", "exit 9")?;

        let err = polish_all(&config, &ws, &reads, &draft).unwrap_err();
        assert_eq!(exit_code(&err), 9);
        assert!(format!("{err}").contains("round 1"));
        assert!(!ws.path("reads_1_2.paf").exists());
        Ok(())
    }

    #[test]
    fn test_failed_replicate_stops_the_others() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let (mut config, ws, reads, draft) = setup(&temp_dir)?;
        config.rounds = 5;
        config.shuffles = 2;
        config.jobs = 2;
        let racon = format!(
            "case \"$*\" in *shuffle_2*) exit 9;; esac\nsleep 1\n{}",
            testing::RACON
        );
        config.tools.racon = testing::fake_tool(temp_dir.path(), "flaky_racon", &racon)?;

        let err = polish_all(&config, &ws, &reads, &draft).unwrap_err();
        assert_eq!(exit_code(&err), 9);
        assert!(format!("{err}").contains("replicate 2"));
        assert!(!ws.path(scaffold_name("reads", 1, 3)).exists());
        assert!(!ws.path(scaffold_name("reads", 1, 5)).exists());
        Ok(())
    }
}
