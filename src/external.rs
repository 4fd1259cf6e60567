//! Invocation of the external tools wrapped by the pipelines.
//!
//! Each builder returns a ready to run [`Command`]; the `run*` helpers wire
//! stdout/stderr, log the command line and turn a non-zero exit into a
//! [`PipelineError`](crate::error::PipelineError).

use std::{
    ffi::OsStr,
    fs::File,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use eyre::{Context, Result};

use crate::{
    config::RaconOpts,
    fastx::SeqFormat,
    utils::{self, check_if_failed},
};

/// Batch size for minimap2, large enough to index a typical read set at once.
pub const MINIMAP2_BATCH: &str = "500M";
pub const OVERLAP_PRESET: &str = "ava-ont";
pub const MAP_PRESET: &str = "map-ont";
pub const MINIASM_MIN_OVERLAP: &str = "100";
pub const MINIASM_MIN_COVERAGE: &str = "3";
pub const PORECHOP_CHECK_READS: &str = "1000";

#[derive(Debug, Clone)]
pub struct Tool {
    name: &'static str,
    path: PathBuf,
}

impl Tool {
    pub fn new<P: Into<PathBuf>>(name: &'static str, path: P) -> Self {
        Tool {
            name,
            path: path.into(),
        }
    }

    /// Use `path` if given, otherwise look `name` up on $PATH.
    pub fn resolve(name: &'static str, path: &Option<PathBuf>) -> Result<Self> {
        let path = utils::find_binary(name, path)?;
        log::debug!("Using {name} at {}", path.display());
        Ok(Tool { name, path })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn command(&self) -> Command {
        Command::new(&self.path)
    }
}

/// Run a tool, sending its stdout to `output` and stderr to the run log.
pub fn run_to_file(tool: &Tool, mut cmd: Command, output: &Path, log_file: &File) -> Result<()> {
    let stdout = File::create(output)
        .wrap_err_with(|| format!("Failed to create {}", output.display()))?;
    cmd.stdout(stdout).stderr(log_file.try_clone()?);
    log::info!("{cmd:?} > {}", output.display());
    let status = cmd
        .status()
        .wrap_err_with(|| format!("Failed to launch {}", tool.name()))?;
    check_if_failed(status, tool.name())
}

/// Run a tool that writes its own output files, both streams go to the log.
pub fn run(tool: &Tool, mut cmd: Command, log_file: &File) -> Result<()> {
    cmd.stdout(log_file.try_clone()?)
        .stderr(log_file.try_clone()?);
    log::info!("{cmd:?}");
    let status = cmd
        .status()
        .wrap_err_with(|| format!("Failed to launch {}", tool.name()))?;
    check_if_failed(status, tool.name())
}

/// Run `producer | consumer`, failing if either side fails.
///
/// The consumer's status is checked first: a producer killed by SIGPIPE after
/// the consumer died must not mask the consumer's exit code.
pub fn run_piped(
    producer: (&Tool, Command),
    consumer: (&Tool, Command),
    log_file: &File,
) -> Result<()> {
    let (producer_tool, mut producer_cmd) = producer;
    let (consumer_tool, mut consumer_cmd) = consumer;

    producer_cmd
        .stdout(Stdio::piped())
        .stderr(log_file.try_clone()?);
    log::info!("{producer_cmd:?}");
    let mut producer_child = producer_cmd
        .spawn()
        .wrap_err_with(|| format!("Failed to launch {}", producer_tool.name()))?;
    let pipe = producer_child
        .stdout
        .take()
        .ok_or_else(|| eyre::eyre!("Could not capture stdout"))?;

    consumer_cmd
        .stdin(pipe)
        .stdout(log_file.try_clone()?)
        .stderr(log_file.try_clone()?);
    log::info!("| {consumer_cmd:?}");
    let consumer_child = consumer_cmd.spawn();
    // The command still owns our copy of the pipe's read end.
    drop(consumer_cmd);
    let mut consumer_child = match consumer_child {
        Ok(child) => child,
        Err(e) => {
            let _ = producer_child.kill();
            let _ = producer_child.wait();
            return Err(e).wrap_err_with(|| format!("Failed to launch {}", consumer_tool.name()));
        }
    };

    let consumer_status = consumer_child.wait()?;
    let producer_status = producer_child.wait()?;

    check_if_failed(consumer_status, consumer_tool.name())?;
    check_if_failed(producer_status, producer_tool.name())
}

/// All-vs-all overlaps of `queries` against `targets`.
pub fn minimap2_overlap<P, Q>(minimap2: &Tool, threads: usize, targets: P, queries: Q) -> Command
where
    P: AsRef<OsStr>,
    Q: AsRef<OsStr>,
{
    let mut cmd = minimap2.command();
    cmd.args(["-K", MINIMAP2_BATCH])
        .args(["-x", OVERLAP_PRESET])
        .arg("-t")
        .arg(threads.to_string())
        .arg(targets)
        .arg(queries);
    cmd
}

/// Map `reads` onto `target` producing PAF.
pub fn minimap2_map<P, Q>(minimap2: &Tool, threads: usize, target: P, reads: Q) -> Command
where
    P: AsRef<OsStr>,
    Q: AsRef<OsStr>,
{
    let mut cmd = minimap2.command();
    cmd.args(["-K", MINIMAP2_BATCH])
        .args(["-x", MAP_PRESET])
        .arg("-t")
        .arg(threads.to_string())
        .arg(target)
        .arg(reads);
    cmd
}

/// Align `input` to `reference` producing SAM on stdout. With `catalogue`
/// the alignment carries the tags needed to catalogue errors.
pub fn minimap2_align<P, Q>(
    minimap2: &Tool,
    threads: usize,
    reference: P,
    input: Q,
    catalogue: bool,
) -> Command
where
    P: AsRef<OsStr>,
    Q: AsRef<OsStr>,
{
    let mut cmd = minimap2.command();
    cmd.arg("-a")
        .args(["-x", MAP_PRESET])
        .arg("--secondary=no")
        .arg("-t")
        .arg(threads.to_string());
    if catalogue {
        cmd.args(["--eqx", "--MD", "-Y"]);
    }
    cmd.arg(reference).arg(input);
    cmd
}

/// Polish `target` with `reads` aligned in `overlaps`. `-q -1` makes racon
/// trust every base equally.
pub fn racon<P, Q, R>(
    racon: &Tool,
    threads: usize,
    opts: &RaconOpts,
    reads: P,
    overlaps: Q,
    target: R,
) -> Command
where
    P: AsRef<OsStr>,
    Q: AsRef<OsStr>,
    R: AsRef<OsStr>,
{
    let mut cmd = racon.command();
    cmd.args(["-q", "-1"])
        .arg("-t")
        .arg(threads.to_string())
        .args(opts.args())
        .arg(reads)
        .arg(overlaps)
        .arg(target);
    cmd
}

/// Fragment correction of the `target` reads.
pub fn racon_correct<P, Q, R>(
    racon: &Tool,
    threads: usize,
    opts: &RaconOpts,
    reads: P,
    overlaps: Q,
    target: R,
) -> Command
where
    P: AsRef<OsStr>,
    Q: AsRef<OsStr>,
    R: AsRef<OsStr>,
{
    let mut cmd = racon.command();
    cmd.arg("-f")
        .args(["-q", "-1"])
        .arg("-t")
        .arg(threads.to_string())
        .args(opts.args())
        .arg(reads)
        .arg(overlaps)
        .arg(target);
    cmd
}

pub fn miniasm<P, Q>(miniasm: &Tool, reads: P, overlaps: Q) -> Command
where
    P: AsRef<OsStr>,
    Q: AsRef<OsStr>,
{
    let mut cmd = miniasm.command();
    cmd.args(["-s", MINIASM_MIN_OVERLAP])
        .args(["-e", MINIASM_MIN_COVERAGE])
        .arg("-f")
        .arg(reads)
        .arg(overlaps);
    cmd
}

pub fn porechop<P, Q>(
    porechop: &Tool,
    threads: usize,
    input: P,
    output: Q,
    format: SeqFormat,
) -> Command
where
    P: AsRef<OsStr>,
    Q: AsRef<OsStr>,
{
    let mut cmd = porechop.command();
    cmd.arg("-i")
        .arg(input)
        .arg("-o")
        .arg(output)
        .args(["--format", format.extension()])
        .args(["--check_reads", PORECHOP_CHECK_READS])
        .arg("--discard_middle")
        .arg("-t")
        .arg(threads.to_string());
    cmd
}

/// Shuffle `input` to stdout, seeded so replicates are reproducible.
pub fn seqkit_shuffle<P: AsRef<OsStr>>(seqkit: &Tool, threads: usize, seed: usize, input: P) -> Command {
    let mut cmd = seqkit.command();
    cmd.arg("shuffle")
        .arg("-s")
        .arg(seed.to_string())
        .arg("-j")
        .arg(threads.to_string())
        .arg(input);
    cmd
}

/// Sort SAM from stdin into an indexed BAM.
pub fn samtools_sort<P, Q>(samtools: &Tool, threads: usize, tmp_prefix: P, output: Q) -> Command
where
    P: AsRef<OsStr>,
    Q: AsRef<OsStr>,
{
    let mut cmd = samtools.command();
    cmd.arg("sort")
        .arg("--write-index")
        .arg("-@")
        .arg(threads.to_string())
        .arg("-T")
        .arg(tmp_prefix)
        .arg("-o")
        .arg(output);
    cmd
}

pub fn stats_from_bam<P, Q>(tool: &Tool, threads: usize, bam: P, output: Q) -> Command
where
    P: AsRef<OsStr>,
    Q: AsRef<OsStr>,
{
    let mut cmd = tool.command();
    cmd.arg(bam)
        .arg("-o")
        .arg(output)
        .arg("-t")
        .arg(threads.to_string());
    cmd
}

pub fn summary_from_stats<P, Q>(tool: &Tool, stats: P, output: Q) -> Command
where
    P: AsRef<OsStr>,
    Q: AsRef<OsStr>,
{
    let mut cmd = tool.command();
    cmd.arg("-i").arg(stats).arg("-pr").arg("-o").arg(output);
    cmd
}

pub fn catalogue_errors<P, Q>(tool: &Tool, threads: usize, bam: P, output_dir: Q) -> Command
where
    P: AsRef<OsStr>,
    Q: AsRef<OsStr>,
{
    let mut cmd = tool.command();
    cmd.arg(bam)
        .arg("-t")
        .arg(threads.to_string())
        .arg("-o")
        .arg(output_dir);
    cmd
}

#[cfg(test)]
mod test {
    use std::{fs, sync::mpsc, thread, time::Duration};

    use assert_fs::TempDir;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{error::exit_code, testing};

    fn args(cmd: &Command) -> Vec<String> {
        cmd.get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_overlap_args() {
        let tool = Tool::new("minimap2", "/usr/bin/minimap2");
        let cmd = minimap2_overlap(&tool, 8, "reads.fastq", "reads.fastq");
        assert_eq!(cmd.get_program(), "/usr/bin/minimap2");
        assert_eq!(
            args(&cmd),
            vec!["-K", "500M", "-x", "ava-ont", "-t", "8", "reads.fastq", "reads.fastq"]
        );
    }

    #[test]
    fn test_racon_args() {
        let tool = Tool::new("racon", "racon");
        let opts = RaconOpts::parse(Some("-w 250"));
        let cmd = racon(&tool, 2, &opts, "reads.fq", "aln.paf", "draft.fa");
        assert_eq!(
            args(&cmd),
            vec!["-q", "-1", "-t", "2", "-w", "250", "reads.fq", "aln.paf", "draft.fa"]
        );

        let cmd = racon_correct(&tool, 2, &RaconOpts::default(), "r", "o", "t");
        assert_eq!(args(&cmd)[0], "-f");
        assert!(args(&cmd).ends_with(&["r".to_string(), "o".to_string(), "t".to_string()]));
    }

    #[test]
    fn test_align_catalogue_args() {
        let tool = Tool::new("minimap2", "minimap2");
        let default = args(&minimap2_align(&tool, 1, "ref.fa", "assm.fa", false));
        assert!(!default.contains(&"--eqx".to_string()));
        let catalogue = args(&minimap2_align(&tool, 1, "ref.fa", "assm.fa", true));
        assert!(catalogue.contains(&"--eqx".to_string()));
        assert_eq!(catalogue.last().unwrap(), "assm.fa");
    }

    #[test]
    fn test_porechop_and_shuffle_args() {
        let tool = Tool::new("porechop", "porechop");
        let cmd = porechop(&tool, 4, "in.fastq", "out.fastq", SeqFormat::Fastq);
        let a = args(&cmd);
        assert!(a.contains(&"--discard_middle".to_string()));
        assert!(a.windows(2).any(|w| w == ["--check_reads", "1000"]));

        let tool = Tool::new("seqkit", "seqkit");
        let a = args(&seqkit_shuffle(&tool, 1, 3, "reads.fastq"));
        assert_eq!(a, vec!["shuffle", "-s", "3", "-j", "1", "reads.fastq"]);
    }

    #[test]
    fn test_run_to_file_and_failure() -> eyre::Result<()> {
        let temp_dir = TempDir::new()?;
        let log_file = File::create(temp_dir.path().join("log.txt"))?;

        let echo = testing::fake_tool(temp_dir.path(), "echo_tool", "echo hello")?;
        let output = temp_dir.path().join("out.txt");
        run_to_file(&echo, echo.command(), &output, &log_file)?;
        assert_eq!(fs::read_to_string(&output)?, "hello\n");

        let failing = testing::fake_tool(temp_dir.path(), "failing", "exit 4")?;
        let err = run(&failing, failing.command(), &log_file).unwrap_err();
        assert_eq!(exit_code(&err), 4);
        Ok(())
    }

    #[test]
    fn test_run_piped() -> eyre::Result<()> {
        let temp_dir = TempDir::new()?;
        let log_file = File::create(temp_dir.path().join("log.txt"))?;
        let producer = testing::fake_tool(temp_dir.path(), "producer", "echo piped")?;
        let output = temp_dir.path().join("piped.txt");
        let consumer = testing::fake_tool(
            temp_dir.path(),
            "consumer",
            &format!("cat > {}", output.display()),
        )?;
        run_piped(
            (&producer, producer.command()),
            (&consumer, consumer.command()),
            &log_file,
        )?;
        assert_eq!(fs::read_to_string(&output)?, "piped\n");

        let failing = testing::fake_tool(temp_dir.path(), "failing", "exit 5")?;
        let err = run_piped(
            (&failing, failing.command()),
            (&consumer, consumer.command()),
            &log_file,
        )
        .unwrap_err();
        assert_eq!(exit_code(&err), 5);
        Ok(())
    }

    #[test]
    fn test_run_piped_consumer_failure_returns() -> eyre::Result<()> {
        let temp_dir = TempDir::new()?;
        let log_path = temp_dir.path().join("log.txt");
        // more output than a pipe buffer holds
        let producer =
            testing::fake_tool(temp_dir.path(), "producer", "head -c 10000000 /dev/zero")?;
        let consumer = testing::fake_tool(temp_dir.path(), "consumer", "exit 3")?;

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let result = File::create(&log_path).map_err(eyre::Report::from).and_then(|log_file| {
                run_piped(
                    (&producer, producer.command()),
                    (&consumer, consumer.command()),
                    &log_file,
                )
            });
            let _ = tx.send(result);
        });

        let err = rx
            .recv_timeout(Duration::from_secs(30))
            .expect("run_piped blocked after the consumer exited")
            .unwrap_err();
        assert_eq!(exit_code(&err), 3);
        Ok(())
    }
}
