//! Job repository interface.

use async_trait::async_trait;

use vguard_models::{JobId, VideoJob};

use crate::error::StoreResult;

/// Storage for [`VideoJob`] records.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Store a new job. Fails with `AlreadyExists` if the id is taken.
    async fn insert(&self, job: &VideoJob) -> StoreResult<()>;

    /// Load a job by id.
    async fn get(&self, id: &JobId) -> StoreResult<Option<VideoJob>>;

    /// Overwrite an existing job record. Fails with `NotFound` if absent.
    async fn save(&self, job: &VideoJob) -> StoreResult<()>;

    /// Round-trip check used by readiness probes.
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
