//! Subscription intents, kept independently of any connection.

use tokio::sync::RwLock;

use vguard_models::JobId;

/// Jobs the consumer wants pushed events for, in the order they were asked for.
///
/// Every (re)connection replays the whole set as fresh subscribe commands.
#[derive(Debug, Default)]
pub struct SubscriptionIntents {
    jobs: RwLock<Vec<JobId>>,
}

impl SubscriptionIntents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an intent. Returns false if it was already held.
    pub async fn add(&self, job_id: JobId) -> bool {
        let mut jobs = self.jobs.write().await;
        if jobs.contains(&job_id) {
            return false;
        }
        jobs.push(job_id);
        true
    }

    pub async fn remove(&self, job_id: &JobId) -> bool {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|held| held != job_id);
        jobs.len() != before
    }

    pub async fn contains(&self, job_id: &JobId) -> bool {
        self.jobs.read().await.contains(job_id)
    }

    /// Snapshot of all pending intents.
    pub async fn pending(&self) -> Vec<JobId> {
        self.jobs.read().await.clone()
    }
}
