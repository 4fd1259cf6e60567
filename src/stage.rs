use std::{
    fs,
    path::{Path, PathBuf},
};

use eyre::{Context, Result};

use crate::{
    config::{AssembleConfig, Workspace},
    fastx::{self, FastxWriter, SeqFormat},
    utils,
};

/// A read file together with the format every later stage expects it in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadSet {
    pub path: PathBuf,
    pub format: SeqFormat,
}

impl ReadSet {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        let path = path.into();
        let format = SeqFormat::from_path(&path);
        ReadSet { path, format }
    }

    /// Extension to reuse for files derived from this read set.
    pub fn extension(&self) -> &str {
        utils::extension(&self.path).unwrap_or_else(|| self.format.extension())
    }

    /// `{prefix}{suffix}.{ext}` inside the workspace, matching this read
    /// set's extension.
    pub fn sibling(&self, ws: &Workspace, prefix: &str, suffix: &str) -> ReadSet {
        ReadSet {
            path: ws.path(format!("{prefix}{suffix}.{}", self.extension())),
            format: self.format,
        }
    }
}

/// Find all fastq files below `dir`, sorted so concatenation order is stable.
fn find_fastqs(dir: &Path) -> Result<Vec<PathBuf>> {
    let dir = dir
        .to_str()
        .ok_or_else(|| eyre::eyre!("Failed to convert path into str, unicode issue?"))?;
    let mut fastqs = Vec::new();
    for pattern in [format!("{dir}/**/*.fastq"), format!("{dir}/**/*.fq")] {
        for fastq in glob::glob(&pattern)? {
            let fastq = fastq?;
            log::info!("Found fastq: {}", fastq.display());
            fastqs.push(fastq);
        }
    }
    fastqs.sort();
    if fastqs.is_empty() {
        return Err(eyre::eyre!(
            "No fastq files found, check if directory contained files ending with .fastq or .fq"
        ));
    }
    Ok(fastqs)
}

/// Copy the input reads into the workspace as `{prefix}.{ext}`.
///
/// FASTQ input either keeps its qualities verbatim or has every quality
/// replaced by the mock value. FASTA input is copied as is. A directory is
/// treated as a collection of fastq files that are concatenated first.
pub fn stage_reads(config: &AssembleConfig, ws: &Workspace) -> Result<ReadSet> {
    if config.input.is_dir() {
        return stage_directory(config, ws);
    }

    let input = ReadSet::new(&config.input);
    let staged = input.sibling(ws, &config.prefix, "");
    match input.format {
        SeqFormat::Fastq if !config.keep_qualities => {
            log::info!("Replacing qualities with mock value {}", config.mock_q);
            let n_reads =
                fastx::mock_qualities(&input.path, input.format, &staged.path, config.mock_q)?;
            log::info!("Staged {n_reads} reads");
        }
        _ => {
            fs::copy(&input.path, &staged.path).wrap_err_with(|| {
                format!("Failed to copy {} into the output directory", input.path.display())
            })?;
        }
    }
    log::info!("Reads staged at {}", staged.path.display());
    Ok(staged)
}

fn stage_directory(config: &AssembleConfig, ws: &Workspace) -> Result<ReadSet> {
    log::info!("Detected directory, concatenating into a single fastq file.");
    let fastqs = find_fastqs(&config.input)?;
    let staged = ReadSet {
        path: ws.path(format!("{}.fastq", config.prefix)),
        format: SeqFormat::Fastq,
    };
    if config.keep_qualities {
        fastx::cat(&fastqs, &staged.path)?;
    } else {
        let mut writer = FastxWriter::to_file(&staged.path, SeqFormat::Fastq)?;
        for fastq in fastqs.iter() {
            fastx::for_each_record(fastq, SeqFormat::Fastq, |rec| {
                writer.write(&rec.with_mock_quality(config.mock_q))
            })?;
        }
        writer.flush()?;
    }
    log::info!("Processed {} fastq files", fastqs.len());
    Ok(staged)
}
