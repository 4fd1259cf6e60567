use std::{
    borrow::Cow,
    fs, io,
    path::{Path, PathBuf},
    process::ExitStatus,
    time::Duration,
};

use eyre::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use which::which;

use crate::error::PipelineError;

/// Use the user supplied location of a binary, otherwise search $PATH for it.
pub fn find_binary(name: &'static str, binary_filepath: &Option<PathBuf>) -> Result<PathBuf> {
    if let Some(p) = binary_filepath {
        Ok(p.to_path_buf())
    } else {
        which(name).map_err(|_| PipelineError::ToolNotFound(name).into())
    }
}

/// Turn the exit status of an external tool into an error carrying its exit
/// code.
pub fn check_if_failed(status: ExitStatus, tool: &'static str) -> Result<()> {
    if status.success() {
        return Ok(());
    }
    match status.code() {
        Some(code) => Err(PipelineError::ToolFailed { tool, code }.into()),
        None => Err(PipelineError::ToolKilled { tool }.into()),
    }
}

/// Run a pipeline stage behind a spinner. The stage name is attached to any
/// error so the driver can report which stage failed.
pub fn wrap_cmd<F, T, M>(msg: M, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
    M: Into<Cow<'static, str>>,
{
    let msg = msg.into();
    let p = ProgressBar::new_spinner()
        .with_style(ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] {msg}",
        )?)
        .with_message(msg.clone());
    p.enable_steady_tick(Duration::from_millis(100));
    log::info!("Starting: {msg}");

    match f() {
        Ok(x) => {
            log::info!("Finished: {msg}");
            p.finish_with_message(format!("✅ \"{msg}\" complete"));
            Ok(x)
        }
        Err(e) => {
            log::error!("{msg} failed: {e:?}");
            p.finish_with_message(format!("❌ \"{msg}\" failed"));
            Err(e).wrap_err_with(|| format!("\"{msg}\" failed, check the log file"))
        }
    }
}

/// Fails if the output location is already present, so earlier results are
/// never clobbered.
pub fn ensure_absent<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if path.try_exists()? {
        Err(PipelineError::OutputExists(path.to_path_buf()).into())
    } else {
        Ok(())
    }
}

/// Create a fresh output directory. Parent directories are created as
/// needed but the directory itself must not exist yet.
pub fn create_fresh_dir<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    match fs::create_dir(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            Err(PipelineError::OutputExists(path.to_path_buf()).into())
        }
        Err(e) => Err(e).wrap_err_with(|| format!("Failed to create {}", path.display())),
    }
}

/// File extension of a path, used to keep the staged copy's naming in line
/// with the input.
pub fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}
