//! Stand-in tool scripts for exercising the pipelines without the real
//! binaries.

use std::{
    fs,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};

use eyre::Result;

use crate::{
    config::{AssembleConfig, AssembleTools, AssessConfig, AssessTools, RaconOpts},
    external::Tool,
};

/// Write an executable shell script named `name` into `dir`.
pub fn fake_tool(dir: &Path, name: &'static str, body: &str) -> Result<Tool> {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n"))?;
    let mut perms = fs::metadata(&path)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms)?;
    Ok(Tool::new(name, path))
}

/// Prints its last argument's contents, like racon or seqkit echoing the
/// target/input sequences.
pub const CAT_LAST: &str = "for last; do :; done\ncat \"$last\"";

/// Prints the target sequences (last argument) as FASTA, standing in for a
/// racon run that changes nothing.
pub const RACON: &str = "for last; do :; done\ncase \"$(head -c 1 \"$last\")\" in\n  @) awk 'NR%4==1{print \">\"substr($0,2)} NR%4==2{print}' \"$last\";;\n  *) cat \"$last\";;\nesac";

/// Emits an empty alignment.
pub const SILENT: &str = "exit 0";

/// Emits a two segment assembly graph.
pub const MINIASM_GFA: &str =
    "printf 'H\\tVN:Z:1.0\\nS\\tutg000001l\\tACGTACGTAC\\tLN:i:10\\nS\\tutg000002l\\tGGGGCCCC\\tLN:i:8\\n'";

/// Assembly settings with placeholder tools, override fields as needed.
pub fn assemble_config(input: &Path, keep_qualities: bool) -> AssembleConfig {
    AssembleConfig {
        input: input.to_path_buf(),
        keep_qualities,
        reference: None,
        output_dir: PathBuf::from("assm"),
        prefix: "reads".to_string(),
        threads: 1,
        rounds: 4,
        shuffles: 1,
        trim_adapters: false,
        error_correct: None,
        jobs: 1,
        mock_q: 10,
        racon_opts: RaconOpts::default(),
        tools: AssembleTools {
            minimap2: Tool::new("minimap2", "minimap2"),
            racon: Tool::new("racon", "racon"),
            miniasm: None,
            porechop: None,
            seqkit: None,
        },
    }
}

/// Install stand-in minimap2, racon, miniasm, porechop and seqkit into `dir`.
pub fn fake_assemble_tools(dir: &Path) -> Result<AssembleTools> {
    Ok(AssembleTools {
        minimap2: fake_tool(dir, "minimap2", SILENT)?,
        racon: fake_tool(dir, "racon", RACON)?,
        miniasm: Some(fake_tool(dir, "miniasm", MINIASM_GFA)?),
        porechop: Some(fake_tool(
            dir,
            "porechop",
            "while [ $# -gt 0 ]; do case \"$1\" in -i) src=\"$2\"; shift;; -o) dst=\"$2\"; shift;; esac; shift; done\ncp \"$src\" \"$dst\"",
        )?),
        seqkit: Some(fake_tool(dir, "seqkit", CAT_LAST)?),
    })
}

/// Script running `write` with stdout sent to the file given after `-o`.
fn write_to_output(write: &str) -> String {
    format!(
        "while [ $# -gt 0 ]; do case \"$1\" in -o) dst=\"$2\"; shift;; esac; shift; done\n{write} > \"$dst\""
    )
}

/// Summary report with both console sections followed by unrelated lines.
pub const SUMMARY: &str = "Percentage Errors\n  name     mean     q10      q50      q90\n err_ont  1.0  0.5  1.0  1.5\n err_bal  0.9  0.4  0.9  1.4\n    iden  0.3  0.1  0.3  0.5\n     del  0.4  0.2  0.4  0.6\n     ins  0.2  0.1  0.2  0.3\n     sub  0.1  0.0  0.1  0.2\n\nQ Scores\n  name     mean  q10  q50  q90\n err_ont  20.0  18.2  20.0  23.0\n err_bal  20.5  18.5  20.5  23.9\n    iden  25.2  23.0  25.2  30.0\n     del  24.0  22.2  24.0  26.2\n     ins  27.0  25.2  27.0  30.0\n     sub  30.0  26.9  30.0  35.2\ntrailing line\n";

pub fn assess_config(
    input: &Path,
    reference: &Path,
    output_dir: &Path,
    catalogue: bool,
) -> AssessConfig {
    AssessConfig {
        reference: reference.to_path_buf(),
        input: input.to_path_buf(),
        chunk_size: 100_000,
        catalogue,
        threads: 1,
        prefix: "assm".to_string(),
        output_dir: output_dir.to_path_buf(),
        tools: AssessTools {
            minimap2: Tool::new("minimap2", "minimap2"),
            samtools: Tool::new("samtools", "samtools"),
            stats_from_bam: Tool::new("stats_from_bam", "stats_from_bam"),
            summary_from_stats: Tool::new("summary_from_stats", "summary_from_stats"),
            catalogue_errors: None,
        },
    }
}

/// Install stand-in assessment tools into `dir`. The aligner prints its own
/// arguments so tests can see what it was asked to align.
pub fn fake_assess_tools(dir: &Path, catalogue: bool) -> Result<AssessTools> {
    let catalogue_errors = if catalogue {
        Some(fake_tool(
            dir,
            "catalogue_errors",
            "while [ $# -gt 0 ]; do case \"$1\" in -o) dst=\"$2\"; shift;; esac; shift; done\nmkdir -p \"$dst\"",
        )?)
    } else {
        None
    };
    Ok(AssessTools {
        minimap2: fake_tool(dir, "minimap2", "echo \"$@\"")?,
        samtools: fake_tool(dir, "samtools", &write_to_output("cat"))?,
        stats_from_bam: fake_tool(dir, "stats_from_bam", &write_to_output("echo stats"))?,
        summary_from_stats: fake_tool(
            dir,
            "summary_from_stats",
            &write_to_output(&format!("printf '%s' '{SUMMARY}'")),
        )?,
        catalogue_errors,
    })
}
