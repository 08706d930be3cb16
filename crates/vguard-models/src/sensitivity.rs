//! Content classification records and job-level sensitivity verdicts.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw per-label scores reported by a classification backend.
pub type ScoreDetails = BTreeMap<String, f64>;

/// Job-level content verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SensitivityStatus {
    Safe,
    Flagged,
}

impl SensitivityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensitivityStatus::Safe => "safe",
            SensitivityStatus::Flagged => "flagged",
        }
    }
}

/// Classification outcome for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct FrameVerdict {
    pub is_explicit: bool,
    pub is_violent: bool,
    /// Confidence in [0, 1]
    pub confidence: f64,
    #[serde(default)]
    pub score_details: ScoreDetails,
}

/// Classification record for one sampled frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FrameRecord {
    /// 1-based, contiguous across a job
    pub frame_number: u32,
    pub timestamp_seconds: f64,
    pub verdict: FrameVerdict,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FrameRecord {
    /// A successfully scored frame.
    pub fn scored(frame_number: u32, timestamp_seconds: f64, verdict: FrameVerdict) -> Self {
        Self {
            frame_number,
            timestamp_seconds,
            verdict,
            error: None,
        }
    }

    /// A frame whose classification failed. It never counts as explicit or violent.
    pub fn error(frame_number: u32, timestamp_seconds: f64, cause: impl Into<String>) -> Self {
        Self {
            frame_number,
            timestamp_seconds,
            verdict: FrameVerdict::default(),
            error: Some(cause.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Per-frame breakdown attached to a verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct FrameAnalysis {
    pub total_frames: u32,
    pub explicit_frames: u32,
    pub violent_frames: u32,
    pub frame_results: Vec<FrameRecord>,
}

/// Job-level sensitivity verdict produced by the aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SensitivityVerdict {
    pub status: SensitivityStatus,
    pub confidence: f64,
    pub reasons: Vec<String>,
    pub frame_analysis: FrameAnalysis,
}

impl SensitivityVerdict {
    /// Verdict without any sampled frames.
    pub fn without_frames(status: SensitivityStatus, confidence: f64, reason: impl Into<String>) -> Self {
        Self {
            status,
            confidence,
            reasons: vec![reason.into()],
            frame_analysis: FrameAnalysis::default(),
        }
    }

    pub fn is_flagged(&self) -> bool {
        self.status == SensitivityStatus::Flagged
    }
}
