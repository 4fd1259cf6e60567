pub mod assemble;
pub mod assess;
pub mod combine;
pub mod config;
pub mod draft;
pub mod error;
pub mod external;
pub mod fastx;
pub mod polish;
pub mod preprocess;
pub mod stage;
pub mod utils;

#[cfg(test)]
mod testing;

pub use config::{AssembleConfig, AssessConfig, Workspace};
pub use error::PipelineError;
