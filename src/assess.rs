//! Assessment pipeline: align an assembly to its reference and report the
//! error and quality summaries.

use std::{fs, path::PathBuf};

use eyre::{Context, Result};

use crate::{
    config::{AssessConfig, Workspace},
    error::PipelineError,
    external, fastx,
    stage::ReadSet,
    utils::{self, wrap_cmd},
};

/// Summary sections echoed to the console after a run.
pub const REPORT_SECTIONS: [&str; 2] = ["Percentage Errors", "Q Scores"];

/// Lines shown below each section header.
pub const SECTION_LINES: usize = 7;

pub fn log_name(prefix: &str) -> String {
    format!("{prefix}_log.txt")
}

pub fn bam_path(config: &AssessConfig) -> PathBuf {
    config.output_dir.join(format!("{}.bam", config.prefix))
}

/// First line containing `header` plus up to `n_lines` lines after it.
pub fn extract_section(text: &str, header: &str, n_lines: usize) -> Option<String> {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.iter().position(|line| line.contains(header))?;
    let end = (start + n_lines + 1).min(lines.len());
    Some(lines[start..end].join("\n"))
}

/// Pull every report section out of a summary file.
pub fn report_sections(summary: &str) -> Result<Vec<String>> {
    REPORT_SECTIONS
        .iter()
        .map(|&header| {
            extract_section(summary, header, SECTION_LINES)
                .ok_or_else(|| eyre::Report::from(PipelineError::MissingSection(header)))
        })
        .collect()
}

/// Run the assessment and return the report sections to display.
pub fn run(config: &AssessConfig, ws: &Workspace) -> Result<Vec<String>> {
    log::info!("{config:?}");
    let prefix = &config.prefix;
    let tools = &config.tools;
    let bam = ws.path(format!("{prefix}.bam"));
    utils::ensure_absent(&bam)?;

    let input = if config.chunk_size > 0 {
        let chunks = ReadSet::new(&config.input).sibling(ws, prefix, "_chunks");
        wrap_cmd(format!("Splitting into {} base chunks", config.chunk_size), || {
            let n = fastx::split_records(
                &config.input,
                chunks.format,
                &chunks.path,
                config.chunk_size,
            )?;
            log::info!("Wrote {n} chunks to {}", chunks.path.display());
            Ok(chunks.path.clone())
        })?
    } else {
        config.input.clone()
    };

    wrap_cmd("Aligning to reference with minimap2 | samtools sort", || {
        let align = external::minimap2_align(
            &tools.minimap2,
            config.threads,
            &config.reference,
            &input,
            config.catalogue,
        );
        let sort = external::samtools_sort(
            &tools.samtools,
            config.threads,
            ws.path(format!("{prefix}_sort_tmp")),
            &bam,
        );
        external::run_piped(
            (&tools.minimap2, align),
            (&tools.samtools, sort),
            ws.log_file(),
        )
    })?;

    let stats = ws.path(format!("{prefix}_stats.txt"));
    wrap_cmd("Computing alignment statistics", || {
        let cmd = external::stats_from_bam(&tools.stats_from_bam, config.threads, &bam, &stats);
        external::run(&tools.stats_from_bam, cmd, ws.log_file())
    })?;

    let summary = ws.path(format!("{prefix}_summ.txt"));
    wrap_cmd("Summarising statistics", || {
        let cmd = external::summary_from_stats(&tools.summary_from_stats, &stats, &summary);
        external::run(&tools.summary_from_stats, cmd, ws.log_file())
    })?;

    if let Some(ref catalogue_errors) = tools.catalogue_errors {
        let catalogue = ws.path(format!("{prefix}_error_catalogue"));
        wrap_cmd("Cataloguing errors", || {
            let cmd = external::catalogue_errors(catalogue_errors, config.threads, &bam, &catalogue);
            external::run(catalogue_errors, cmd, ws.log_file())
        })?;
    }

    let text = fs::read_to_string(&summary)
        .wrap_err_with(|| format!("Failed to read {}", summary.display()))?;
    report_sections(&text)
}
