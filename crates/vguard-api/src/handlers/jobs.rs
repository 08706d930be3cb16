//! Job creation and status queries.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use vguard_models::{JobId, JobStatusView, Stage};

use crate::auth::OrgContext;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Request to start processing an uploaded file.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
    /// Location of the uploaded source file
    #[validate(length(min = 1, max = 4096))]
    pub source_path: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobResponse {
    pub job_id: JobId,
    pub stage: Stage,
}

/// Probe the upload and start its pipeline.
///
/// Returns once the job record exists; processing continues in the background.
pub async fn create_job(
    State(state): State<AppState>,
    OrgContext(org_id): OrgContext,
    Json(request): Json<CreateJobRequest>,
) -> ApiResult<(StatusCode, Json<CreateJobResponse>)> {
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let handle = state
        .orchestrator
        .submit(org_id.clone(), request.source_path)
        .await?;

    info!(org_id = %org_id, job_id = %handle.job.id, "Job created");

    Ok((
        StatusCode::ACCEPTED,
        Json(CreateJobResponse {
            job_id: handle.job.id,
            stage: handle.job.stage,
        }),
    ))
}

/// Current persisted state of a job.
///
/// Jobs of other organizations are reported as missing.
pub async fn get_job(
    State(state): State<AppState>,
    OrgContext(org_id): OrgContext,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobStatusView>> {
    let job_id = JobId::from_string(job_id);

    let job = match state.store.get(&job_id).await? {
        Some(job) if state.authorizer.can_access(&org_id, &job).await => job,
        _ => return Err(ApiError::not_found(format!("job {}", job_id))),
    };

    Ok(Json(JobStatusView::from(&job)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestApp;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;
    use vguard_store::JobRepository;

    fn create_request(org: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/jobs")
            .header("content-type", "application/json");
        if let Some(org) = org {
            builder = builder.header("x-organization-id", org);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn status_request(org: &str, job_id: &str) -> Request<Body> {
        Request::builder()
            .uri(format!("/api/jobs/{}", job_id))
            .header("x-organization-id", org)
            .body(Body::empty())
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_create_job_returns_accepted() {
        let app = TestApp::new();
        let response = app
            .router()
            .oneshot(create_request(Some("acme"), r#"{"sourcePath":"/uploads/a.mp4"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = json_body(response).await;
        assert_eq!(body["stage"], "uploading");
        let job_id = body["jobId"].as_str().unwrap().to_string();

        let stored = app.store.get(&JobId::from_string(job_id)).await.unwrap();
        assert!(stored.is_some());
    }

    #[tokio::test]
    async fn test_create_job_requires_org() {
        let app = TestApp::new();
        let response = app
            .router()
            .oneshot(create_request(None, r#"{"sourcePath":"/uploads/a.mp4"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(app.store.is_empty().await);
    }

    #[tokio::test]
    async fn test_create_job_rejects_empty_path() {
        let app = TestApp::new();
        let response = app
            .router()
            .oneshot(create_request(Some("acme"), r#"{"sourcePath":""}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["code"], "validation_error");
    }

    #[tokio::test]
    async fn test_unprobeable_upload_creates_no_job() {
        let app = TestApp::new();
        let response = app
            .router()
            .oneshot(create_request(Some("acme"), r#"{"sourcePath":"/uploads/no-video-stream.mp4"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json_body(response).await["code"], "no_video_stream");
        assert!(app.store.is_empty().await);

        let response = app
            .router()
            .oneshot(create_request(Some("acme"), r#"{"sourcePath":"/uploads/tool-missing.mp4"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json_body(response).await["code"], "metadata_tool_unavailable");
    }

    #[tokio::test]
    async fn test_status_query_is_scoped_to_org() {
        let app = TestApp::new();
        let job = app.finished_job("acme").await;

        let response = app
            .router()
            .oneshot(status_request("acme", job.as_str()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["stage"], "flagged");
        assert_eq!(body["overallProgress"], 100);
        assert_eq!(body["sensitivityVerdict"]["status"], "flagged");
        assert!(body.get("orgId").is_none());

        let response = app
            .router()
            .oneshot(status_request("intruder", job.as_str()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let app = TestApp::new();
        let response = app
            .router()
            .oneshot(status_request("acme", "does-not-exist"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["code"], "not_found");
    }
}
