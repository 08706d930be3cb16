//! In-memory job store.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use vguard_models::{JobId, VideoJob};

use crate::error::{StoreError, StoreResult};
use crate::repository::JobRepository;

/// Job store kept in process memory. Records are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<JobId, VideoJob>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

#[async_trait]
impl JobRepository for MemoryJobStore {
    async fn insert(&self, job: &VideoJob) -> StoreResult<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(StoreError::already_exists(job.id.as_str()));
        }
        jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn get(&self, id: &JobId) -> StoreResult<Option<VideoJob>> {
        Ok(self.jobs.read().await.get(id).cloned())
    }

    async fn save(&self, job: &VideoJob) -> StoreResult<()> {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&job.id) {
            Some(existing) => {
                *existing = job.clone();
                Ok(())
            }
            None => Err(StoreError::not_found(job.id.as_str())),
        }
    }
}
