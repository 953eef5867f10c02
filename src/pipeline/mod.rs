//! The slice-batch-to-report pipeline.

pub mod raster;
pub mod report;
pub mod staging;

pub use report::{PipelineError, ReportPipeline, SliceError};
pub use staging::StagingArea;

use std::str::FromStr;

/// What to do when a single slice fails to decode, re-encode, or upload.
///
/// `Strict` aborts the whole batch on the first failing slice; `BestEffort`
/// skips failing slices and annotates the report with their names. Chosen in
/// configuration, fixed for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    #[default]
    Strict,
    BestEffort,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "best-effort" | "best_effort" => Ok(Self::BestEffort),
            other => Err(other.to_string()),
        }
    }
}
