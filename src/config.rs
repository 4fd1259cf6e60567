//! Resolved settings for one pipeline run. Built once from the command line
//! and passed by reference to every stage.

use std::{
    env,
    fs::{self, File},
    path::{Path, PathBuf},
};

use eyre::{Context, Result};

use crate::{external::Tool, fastx::LongestReads, utils};

/// Scoring and window options handed to every racon call unless overridden
/// through the `RACONOPTS` environment variable.
pub const DEFAULT_RACON_OPTS: &str = "-m 8 -x -6 -g -8 -w 500";
pub const RACON_OPTS_ENV: &str = "RACONOPTS";

pub const DEFAULT_MOCK_Q: u8 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaconOpts(Vec<String>);

impl RaconOpts {
    /// Split a whitespace separated option string, blank or missing values
    /// fall back to the defaults.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if !v.trim().is_empty() => {
                RaconOpts(v.split_whitespace().map(str::to_string).collect())
            }
            _ => RaconOpts::default(),
        }
    }

    pub fn from_env() -> Self {
        let value = env::var(RACON_OPTS_ENV).ok();
        let opts = RaconOpts::parse(value.as_deref());
        log::debug!("racon options: {opts:?}");
        opts
    }

    pub fn args(&self) -> &[String] {
        &self.0
    }
}

impl Default for RaconOpts {
    fn default() -> Self {
        RaconOpts(
            DEFAULT_RACON_OPTS
                .split_whitespace()
                .map(str::to_string)
                .collect(),
        )
    }
}

/// User supplied tool locations, anything missing is searched for on $PATH.
#[derive(Debug, Clone, Default)]
pub struct ToolPaths {
    pub minimap2: Option<PathBuf>,
    pub racon: Option<PathBuf>,
    pub miniasm: Option<PathBuf>,
    pub porechop: Option<PathBuf>,
    pub seqkit: Option<PathBuf>,
    pub samtools: Option<PathBuf>,
    pub stats_from_bam: Option<PathBuf>,
    pub summary_from_stats: Option<PathBuf>,
    pub catalogue_errors: Option<PathBuf>,
}

/// Tools needed by the assembly pipeline. Optional tools are only resolved
/// when the feature that needs them is enabled.
#[derive(Debug, Clone)]
pub struct AssembleTools {
    pub minimap2: Tool,
    pub racon: Tool,
    pub miniasm: Option<Tool>,
    pub porechop: Option<Tool>,
    pub seqkit: Option<Tool>,
}

#[derive(Debug, Clone)]
pub struct AssembleConfig {
    /// Read file, or directory of fastq files to concatenate
    pub input: PathBuf,
    pub keep_qualities: bool,
    /// Absolute path of the reference, switches to reference guided mode
    pub reference: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub prefix: String,
    pub threads: usize,
    pub rounds: usize,
    pub shuffles: usize,
    pub trim_adapters: bool,
    /// Longest reads to error correct
    pub error_correct: Option<LongestReads>,
    /// Shuffle replicates polished at the same time
    pub jobs: usize,
    pub mock_q: u8,
    pub racon_opts: RaconOpts,
    pub tools: AssembleTools,
}

impl AssembleConfig {
    pub fn is_de_novo(&self) -> bool {
        self.reference.is_none()
    }
}

impl AssembleTools {
    pub fn resolve(
        paths: &ToolPaths,
        de_novo: bool,
        trim_adapters: bool,
        shuffles: usize,
    ) -> Result<Self> {
        let optional = |enabled: bool, name: &'static str, path: &Option<PathBuf>| {
            if enabled {
                Tool::resolve(name, path).map(Some)
            } else {
                Ok(None)
            }
        };
        Ok(AssembleTools {
            minimap2: Tool::resolve("minimap2", &paths.minimap2)?,
            racon: Tool::resolve("racon", &paths.racon)?,
            miniasm: optional(de_novo, "miniasm", &paths.miniasm)?,
            porechop: optional(trim_adapters, "porechop", &paths.porechop)?,
            seqkit: optional(shuffles > 1, "seqkit", &paths.seqkit)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct AssessTools {
    pub minimap2: Tool,
    pub samtools: Tool,
    pub stats_from_bam: Tool,
    pub summary_from_stats: Tool,
    pub catalogue_errors: Option<Tool>,
}

impl AssessTools {
    pub fn resolve(paths: &ToolPaths, catalogue: bool) -> Result<Self> {
        let catalogue_errors = if catalogue {
            Some(Tool::resolve("catalogue_errors", &paths.catalogue_errors)?)
        } else {
            None
        };
        Ok(AssessTools {
            minimap2: Tool::resolve("minimap2", &paths.minimap2)?,
            samtools: Tool::resolve("samtools", &paths.samtools)?,
            stats_from_bam: Tool::resolve("stats_from_bam", &paths.stats_from_bam)?,
            summary_from_stats: Tool::resolve("summary_from_stats", &paths.summary_from_stats)?,
            catalogue_errors,
        })
    }
}

#[derive(Debug, Clone)]
pub struct AssessConfig {
    pub reference: PathBuf,
    pub input: PathBuf,
    /// Maximum piece length before alignment, 0 disables chunking
    pub chunk_size: usize,
    pub catalogue: bool,
    pub threads: usize,
    pub prefix: String,
    pub output_dir: PathBuf,
    pub tools: AssessTools,
}

/// Output directory of a run together with the log file that collects the
/// stderr of every external tool.
#[derive(Debug)]
pub struct Workspace {
    dir: PathBuf,
    log_file: File,
}

impl Workspace {
    /// Create a brand new output directory, failing if it already exists.
    pub fn create<P: AsRef<Path>>(dir: P, log_name: &str) -> Result<Self> {
        let dir = dir.as_ref();
        utils::create_fresh_dir(dir)?;
        Workspace::with_log(dir, log_name)
    }

    /// Use `dir` as is, creating it when missing.
    pub fn open<P: AsRef<Path>>(dir: P, log_name: &str) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        Workspace::with_log(dir, log_name)
    }

    fn with_log(dir: &Path, log_name: &str) -> Result<Self> {
        let log_path = dir.join(log_name);
        let log_file = File::create(&log_path)
            .wrap_err_with(|| format!("Failed to create {}", log_path.display()))?;
        Ok(Workspace {
            dir: dir.to_path_buf(),
            log_file,
        })
    }

    pub fn path<P: AsRef<Path>>(&self, name: P) -> PathBuf {
        self.dir.join(name)
    }

    pub fn log_file(&self) -> &File {
        &self.log_file
    }
}

#[cfg(test)]
mod test {
    use assert_fs::TempDir;

    use super::*;
    use crate::error::PipelineError;

    #[test]
    fn test_racon_opts_parse() {
        assert_eq!(RaconOpts::parse(None), RaconOpts::default());
        assert_eq!(RaconOpts::parse(Some("   ")), RaconOpts::default());
        assert_eq!(
            RaconOpts::default().args(),
            &["-m", "8", "-x", "-6", "-g", "-8", "-w", "500"]
        );
        let opts = RaconOpts::parse(Some(" -m 5  -w 100 "));
        assert_eq!(opts.args(), &["-m", "5", "-w", "100"]);
    }

    #[test]
    fn test_optional_tools_skipped() -> Result<()> {
        let paths = ToolPaths {
            minimap2: Some(PathBuf::from("/opt/minimap2")),
            racon: Some(PathBuf::from("/opt/racon")),
            ..Default::default()
        };
        let tools = AssembleTools::resolve(&paths, false, false, 1)?;
        assert!(tools.miniasm.is_none());
        assert!(tools.porechop.is_none());
        assert!(tools.seqkit.is_none());
        assert_eq!(tools.racon.path(), Path::new("/opt/racon"));
        Ok(())
    }

    #[test]
    fn test_workspace_create_refuses_existing() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let out = temp_dir.path().join("assm");
        let ws = Workspace::create(&out, "log.txt")?;
        assert!(ws.path("log.txt").exists());
        assert_eq!(ws.path("reads.fa"), out.join("reads.fa"));

        let err = Workspace::create(&out, "log.txt").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::OutputExists(_))
        ));

        let reopened = Workspace::open(&out, "assess_log.txt")?;
        assert!(reopened.path("assess_log.txt").exists());
        Ok(())
    }
}
