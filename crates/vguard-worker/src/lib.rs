//! Video pipeline worker.
//!
//! This crate provides:
//! - Job submission with a synchronous metadata precondition
//! - The per-job state machine (processing, analyzing, compressing, finalizing)
//! - Write-then-notify progress reporting
//! - Structured job logging and pipeline metrics

pub mod analysis;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod progress;
pub mod reporter;

#[cfg(test)]
mod test_support;

pub use analysis::AnalysisStage;
pub use config::WorkerConfig;
pub use error::{PipelineError, PipelineResult};
pub use logging::{init_tracing, JobLogger};
pub use pipeline::{JobHandle, Orchestrator, PipelineDeps};
pub use progress::ProgressWindow;
pub use reporter::JobReporter;
