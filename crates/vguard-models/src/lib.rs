//! Shared data models for the VidGuard processing pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Video jobs and their stage state machine
//! - Per-frame classification records and job-level sensitivity verdicts
//! - Progress events and the WebSocket subscription protocol
//! - The job status projection returned to pollers

pub mod job;
pub mod job_status;
pub mod progress;
pub mod sensitivity;

// Re-export common types
pub use job::{JobId, OrgId, ProbedMetadata, Stage, TransitionError, VideoJob};
pub use job_status::JobStatusView;
pub use progress::{ClientMessage, ProgressEvent, ServerMessage, Topic};
pub use sensitivity::{
    FrameAnalysis, FrameRecord, FrameVerdict, ScoreDetails, SensitivityStatus, SensitivityVerdict,
};
