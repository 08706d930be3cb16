//! Status queries over HTTP.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use vguard_models::{JobId, OrgId};

use crate::config::ConsumerConfig;
use crate::error::{ClientError, ClientResult};
use crate::transport::StatusSource;
use crate::wire::StatusSnapshot;

/// Header carrying the organization on API requests.
pub const ORG_HEADER: &str = "x-organization-id";

/// Queries `GET {base}/api/jobs/{job_id}`.
pub struct HttpStatusSource {
    http: Client,
    base_url: String,
    org_id: OrgId,
}

impl HttpStatusSource {
    pub fn new(config: &ConsumerConfig) -> ClientResult<Self> {
        let http = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            org_id: config.org_id.clone(),
        })
    }
}

#[async_trait]
impl StatusSource for HttpStatusSource {
    async fn fetch(&self, job_id: &JobId) -> ClientResult<Option<StatusSnapshot>> {
        let url = format!("{}/api/jobs/{}", self.base_url, job_id);
        debug!(job_id = %job_id, "Querying job status");

        let response = self
            .http
            .get(&url)
            .header(ORG_HEADER, self.org_id.as_str())
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json().await?)),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(ClientError::RequestFailed(format!(
                    "status query returned {}: {}",
                    status, body
                )))
            }
        }
    }
}
