//! Job status projection for polling queries.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::job::{JobId, ProbedMetadata, Stage, VideoJob};
use crate::sensitivity::SensitivityVerdict;

/// Read-only view of a persisted job, returned by the status query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusView {
    pub job_id: JobId,
    pub stage: Stage,
    pub overall_progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensitivity_verdict: Option<SensitivityVerdict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived_path: Option<String>,
    pub metadata: ProbedMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobStatusView {
    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }
}

impl From<&VideoJob> for JobStatusView {
    fn from(job: &VideoJob) -> Self {
        Self {
            job_id: job.id.clone(),
            stage: job.stage,
            overall_progress: job.overall_progress,
            sensitivity_verdict: job.sensitivity_verdict.clone(),
            derived_path: job
                .derived_path
                .as_ref()
                .map(|p| p.to_string_lossy().to_string()),
            metadata: job.probed_metadata.clone(),
            created_at: job.created_at,
            updated_at: job.updated_at,
            completed_at: job.completed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::OrgId;

    #[test]
    fn test_projection_omits_org_and_source() {
        let job = VideoJob::new(OrgId::from_string("org"), "/uploads/x.mp4", ProbedMetadata::default());
        let view = JobStatusView::from(&job);
        let json = serde_json::to_string(&view).unwrap();
        assert!(json.contains("\"stage\":\"uploading\""));
        assert!(json.contains("\"overallProgress\":0"));
        assert!(!json.contains("sourcePath"));
        assert!(!json.contains("derivedPath"));
    }
}
