//! Lenient decoding of what the server sends.
//!
//! Status fields stay raw strings here; [`crate::Phase::infer`] decides
//! what they mean.

use serde::Deserialize;

use vguard_models::{FrameRecord, JobId, SensitivityStatus, SensitivityVerdict};

/// A pushed progress event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushEvent {
    pub job_id: JobId,
    #[serde(default, alias = "status")]
    pub stage: Option<String>,
    #[serde(default)]
    pub fraction_complete: Option<f64>,
    #[serde(default)]
    pub display_status: Option<String>,
    #[serde(default)]
    pub current_frame: Option<u32>,
    #[serde(default)]
    pub total_frames: Option<u32>,
    #[serde(default)]
    pub frame_record: Option<FrameRecord>,
    #[serde(default)]
    pub sensitivity_status: Option<SensitivityStatus>,
}

/// Result of a direct job status query.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub job_id: JobId,
    #[serde(default, alias = "status")]
    pub stage: Option<String>,
    #[serde(default)]
    pub overall_progress: Option<f64>,
    #[serde(default)]
    pub sensitivity_verdict: Option<SensitivityVerdict>,
    #[serde(default)]
    pub derived_path: Option<String>,
}

/// Message received on the push connection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IncomingMessage {
    Subscribed {
        #[serde(rename = "jobId")]
        job_id: JobId,
    },
    Unsubscribed {
        #[serde(rename = "jobId")]
        job_id: JobId,
    },
    Progress {
        event: PushEvent,
    },
    Error {
        message: String,
        #[serde(rename = "jobId", default)]
        job_id: Option<JobId>,
    },
    #[serde(other)]
    Unknown,
}
