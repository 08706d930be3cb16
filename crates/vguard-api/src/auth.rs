//! Organization context and job access checks.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use vguard_models::{OrgId, VideoJob};

use crate::error::ApiError;

/// Header carrying the caller's organization.
pub const ORG_HEADER: &str = "x-organization-id";

const MAX_ORG_ID_LEN: usize = 128;

/// Decides whether an organization may observe a job.
#[async_trait]
pub trait OrgAuthorizer: Send + Sync {
    async fn can_access(&self, org_id: &OrgId, job: &VideoJob) -> bool;
}

/// Admits an organization to its own jobs only.
#[derive(Debug, Clone, Copy, Default)]
pub struct SameOrgAuthorizer;

#[async_trait]
impl OrgAuthorizer for SameOrgAuthorizer {
    async fn can_access(&self, org_id: &OrgId, job: &VideoJob) -> bool {
        &job.org_id == org_id
    }
}

/// Organization of the caller, from the `x-organization-id` header or,
/// for WebSocket upgrades, the `orgId` query parameter.
#[derive(Debug, Clone)]
pub struct OrgContext(pub OrgId);

#[axum::async_trait]
impl<S> FromRequestParts<S> for OrgContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(ORG_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| org_from_query(parts.uri.query()))
            .ok_or_else(|| ApiError::unauthorized("missing organization context"))?;

        let org = raw.trim();
        if !is_valid_org_id(org) {
            return Err(ApiError::unauthorized("invalid organization id"));
        }
        Ok(OrgContext(OrgId::from_string(org)))
    }
}

fn org_from_query(query: Option<&str>) -> Option<String> {
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "orgId")
        .map(|(_, value)| value.to_string())
}

fn is_valid_org_id(org: &str) -> bool {
    !org.is_empty()
        && org.len() <= MAX_ORG_ID_LEN
        && org
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}
