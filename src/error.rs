use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Output {0:?} already exists, refusing to overwrite previous results")]
    OutputExists(PathBuf),
    #[error("Could not find {0}, install it or pass its location explicitly")]
    ToolNotFound(&'static str),
    #[error("{tool} exited with status {code}")]
    ToolFailed { tool: &'static str, code: i32 },
    #[error("{tool} was terminated by a signal")]
    ToolKilled { tool: &'static str },
    #[error("No sequence records found in {0:?}")]
    EmptyReadSet(PathBuf),
    #[error("Assembly graph {0:?} contains no segments")]
    EmptyAssembly(PathBuf),
    #[error("Section {0:?} not found in summary report")]
    MissingSection(&'static str),
    #[error("Stopped because another replicate failed")]
    Cancelled,
}

impl PipelineError {
    /// Process exit code used when this error terminates a run.
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::ToolFailed { code, .. } => *code,
            _ => 1,
        }
    }
}

/// Walk the error chain and pick the exit code of the first pipeline error,
/// falling back to 1.
pub fn exit_code(report: &eyre::Report) -> i32 {
    report
        .chain()
        .find_map(|e| e.downcast_ref::<PipelineError>())
        .map(PipelineError::exit_code)
        .unwrap_or(1)
}
