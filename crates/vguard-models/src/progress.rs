//! Progress events and the WebSocket subscription protocol.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::job::{JobId, OrgId, Stage};
use crate::sensitivity::{FrameRecord, SensitivityStatus};

/// Broadcast topic for one job, nested inside its organization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub org_id: OrgId,
    pub job_id: JobId,
}

impl Topic {
    pub fn new(org_id: OrgId, job_id: JobId) -> Self {
        Self { org_id, job_id }
    }

    /// Stable key, e.g. `org:acme:job:1234`.
    pub fn key(&self) -> String {
        format!("org:{}:job:{}", self.org_id, self.job_id)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Progress update pushed to observers of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub job_id: JobId,
    pub stage: Stage,
    /// Overall progress (0-100)
    pub fraction_complete: u8,
    /// Human readable status, e.g. "Analyzing frame 3/20"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_frame: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_frames: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_record: Option<FrameRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensitivity_status: Option<SensitivityStatus>,
    pub emitted_at: DateTime<Utc>,
}

impl ProgressEvent {
    /// Create a stage/progress event.
    pub fn stage(job_id: JobId, stage: Stage, progress: u8) -> Self {
        Self {
            job_id,
            stage,
            fraction_complete: progress.min(100),
            display_status: None,
            current_frame: None,
            total_frames: None,
            frame_record: None,
            sensitivity_status: None,
            emitted_at: Utc::now(),
        }
    }

    /// Create a live frame delivery event during analysis.
    pub fn frame(job_id: JobId, progress: u8, record: FrameRecord, total_frames: u32) -> Self {
        let current = record.frame_number;
        Self {
            current_frame: Some(current),
            total_frames: Some(total_frames),
            frame_record: Some(record),
            ..Self::stage(job_id, Stage::Analyzing, progress)
        }
        .with_display(format!("Analyzing frame {}/{}", current, total_frames))
    }

    /// Create the terminal event of a job.
    pub fn terminal(job_id: JobId, stage: Stage, sensitivity: Option<SensitivityStatus>) -> Self {
        Self {
            sensitivity_status: sensitivity,
            ..Self::stage(job_id, stage, 100)
        }
    }

    /// Attach a display status.
    pub fn with_display(mut self, status: impl Into<String>) -> Self {
        self.display_status = Some(status.into());
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }
}

/// Message sent by an observer over the progress WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join the topic of a job. Idempotent per connection.
    Subscribe {
        #[serde(rename = "jobId")]
        job_id: JobId,
    },
    /// Leave the topic of a job.
    Unsubscribe {
        #[serde(rename = "jobId")]
        job_id: JobId,
    },
}

/// Message sent by the server over the progress WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Subscribed {
        #[serde(rename = "jobId")]
        job_id: JobId,
    },
    Unsubscribed {
        #[serde(rename = "jobId")]
        job_id: JobId,
    },
    Progress { event: ProgressEvent },
    Error {
        message: String,
        #[serde(rename = "jobId", default, skip_serializing_if = "Option::is_none")]
        job_id: Option<JobId>,
    },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>, job_id: Option<JobId>) -> Self {
        ServerMessage::Error {
            message: message.into(),
            job_id,
        }
    }
}
