//! Video job record and its stage state machine.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

use crate::sensitivity::{SensitivityStatus, SensitivityVerdict};

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Organization (tenant) that owns a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct OrgId(pub String);

impl OrgId {
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pipeline stage of a job.
///
/// Stages only ever move forward:
/// `uploading -> processing -> analyzing -> compressing -> finalizing`,
/// ending in exactly one of the absorbing terminal stages
/// `completed`, `flagged` or `failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Source upload finished, job record created
    #[default]
    Uploading,
    /// Pipeline picked the job up
    Processing,
    /// Frame sampling and content classification
    Analyzing,
    /// Transcoding to the streamable rendition
    Compressing,
    /// Persisting verdict and rendition path
    Finalizing,
    /// Rendition ready, content judged safe
    Completed,
    /// Rendition ready, content needs review
    Flagged,
    /// A stage failed; no rendition
    Failed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Uploading => "uploading",
            Stage::Processing => "processing",
            Stage::Analyzing => "analyzing",
            Stage::Compressing => "compressing",
            Stage::Finalizing => "finalizing",
            Stage::Completed => "completed",
            Stage::Flagged => "flagged",
            Stage::Failed => "failed",
        }
    }

    /// Check if this is a terminal stage (no more transitions expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Completed | Stage::Flagged | Stage::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            Stage::Uploading => 0,
            Stage::Processing => 1,
            Stage::Analyzing => 2,
            Stage::Compressing => 3,
            Stage::Finalizing => 4,
            Stage::Completed | Stage::Flagged | Stage::Failed => 5,
        }
    }

    /// Whether a job in this stage may move to `next`.
    pub fn can_advance_to(&self, next: Stage) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }

    /// Terminal stage for a finished job with the given verdict.
    pub fn terminal_for(status: SensitivityStatus) -> Stage {
        match status {
            SensitivityStatus::Safe => Stage::Completed,
            SensitivityStatus::Flagged => Stage::Flagged,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rejected stage transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid stage transition {from} -> {to}")]
pub struct TransitionError {
    pub from: Stage,
    pub to: Stage,
}

/// Metadata probed from the source file before the job is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProbedMetadata {
    /// Duration in seconds
    pub duration: f64,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Frame rate (fps)
    pub fps: f64,
    /// Video codec
    pub codec: String,
    /// File size in bytes
    pub size: u64,
    /// Bitrate in bits/second
    pub bitrate: u64,
    /// Whether the container carries an audio stream
    pub has_audio: bool,
}

/// A single end-to-end processing run for one uploaded video.
///
/// Owned by the pipeline orchestrator; every other component only reads it.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VideoJob {
    pub id: JobId,
    pub org_id: OrgId,
    pub stage: Stage,
    /// Overall progress (0-100), never decreases
    pub overall_progress: u8,
    pub source_path: PathBuf,
    /// Set only once the transcode succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub derived_path: Option<PathBuf>,
    pub probed_metadata: ProbedMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensitivity_verdict: Option<SensitivityVerdict>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl VideoJob {
    /// Create a new job record for an uploaded, probed source file.
    pub fn new(org_id: OrgId, source_path: impl Into<PathBuf>, metadata: ProbedMetadata) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            org_id,
            stage: Stage::Uploading,
            overall_progress: 0,
            source_path: source_path.into(),
            derived_path: None,
            probed_metadata: metadata,
            sensitivity_verdict: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }

    /// Move to `stage`, raising progress to at least `progress`.
    pub fn advance(&mut self, stage: Stage, progress: u8) -> Result<(), TransitionError> {
        if !self.stage.can_advance_to(stage) {
            return Err(TransitionError {
                from: self.stage,
                to: stage,
            });
        }
        self.stage = stage;
        self.overall_progress = self.overall_progress.max(progress.min(100));
        self.updated_at = Utc::now();
        if stage.is_terminal() {
            self.completed_at = Some(self.updated_at);
        }
        Ok(())
    }

    /// Raise progress within the current stage.
    ///
    /// Returns false when nothing changed (lower value or terminal job).
    pub fn set_progress(&mut self, progress: u8) -> bool {
        let progress = progress.min(100);
        if self.is_terminal() || progress <= self.overall_progress {
            return false;
        }
        self.overall_progress = progress;
        self.updated_at = Utc::now();
        true
    }

    /// Record the rendition and verdict and enter the matching terminal stage.
    pub fn finish(
        &mut self,
        derived_path: impl Into<PathBuf>,
        verdict: SensitivityVerdict,
    ) -> Result<Stage, TransitionError> {
        let terminal = Stage::terminal_for(verdict.status);
        self.advance(terminal, 100)?;
        self.derived_path = Some(derived_path.into());
        self.sensitivity_verdict = Some(verdict);
        Ok(terminal)
    }

    /// Mark the job failed. No-op on an already terminal job.
    pub fn fail(&mut self) -> bool {
        self.advance(Stage::Failed, 100).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> VideoJob {
        VideoJob::new(OrgId::from_string("org-1"), "/uploads/a.mp4", ProbedMetadata::default())
    }

    #[test]
    fn test_stage_order_is_strictly_forward() {
        assert!(Stage::Uploading.can_advance_to(Stage::Processing));
        assert!(Stage::Analyzing.can_advance_to(Stage::Compressing));
        assert!(Stage::Processing.can_advance_to(Stage::Failed));
        assert!(!Stage::Compressing.can_advance_to(Stage::Analyzing));
        assert!(!Stage::Analyzing.can_advance_to(Stage::Analyzing));
        assert!(!Stage::Completed.can_advance_to(Stage::Failed));
        assert!(!Stage::Failed.can_advance_to(Stage::Completed));
    }

    #[test]
    fn test_advance_keeps_progress_monotonic() {
        let mut job = job();
        job.advance(Stage::Processing, 10).unwrap();
        job.advance(Stage::Analyzing, 30).unwrap();
        assert!(job.set_progress(40));
        assert!(!job.set_progress(35));
        assert_eq!(job.overall_progress, 40);

        // Entering a later stage with a lower nominal value keeps the higher one
        job.advance(Stage::Compressing, 20).unwrap();
        assert_eq!(job.overall_progress, 40);
    }

    #[test]
    fn test_backwards_transition_rejected() {
        let mut job = job();
        job.advance(Stage::Compressing, 50).unwrap();
        let err = job.advance(Stage::Analyzing, 60).unwrap_err();
        assert_eq!(err.from, Stage::Compressing);
        assert_eq!(job.stage, Stage::Compressing);
    }

    #[test]
    fn test_terminal_stage_is_absorbing() {
        let mut job = job();
        assert!(job.fail());
        assert_eq!(job.stage, Stage::Failed);
        assert_eq!(job.overall_progress, 100);
        assert!(job.completed_at.is_some());

        assert!(!job.fail());
        assert!(!job.set_progress(100));
        assert!(job.advance(Stage::Completed, 100).is_err());
    }

    #[test]
    fn test_stage_serialization() {
        let json = serde_json::to_string(&Stage::Compressing).unwrap();
        assert_eq!(json, "\"compressing\"");
    }
}
