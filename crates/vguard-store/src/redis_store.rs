//! Job records as JSON documents in Redis.

use async_trait::async_trait;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::debug;

use vguard_models::{JobId, VideoJob};

use crate::error::{StoreError, StoreResult};
use crate::repository::JobRepository;

/// Redis store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Key prefix; records live under `{prefix}:job:{id}`
    pub key_prefix: String,
    /// Expiry of a job record after its last write
    pub record_ttl: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            key_prefix: "vguard".to_string(),
            record_ttl: Duration::from_secs(7 * 24 * 3600),
        }
    }
}

impl StoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            key_prefix: std::env::var("STORE_KEY_PREFIX").unwrap_or_else(|_| "vguard".to_string()),
            record_ttl: Duration::from_secs(
                std::env::var("STORE_RECORD_TTL")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(7 * 24 * 3600),
            ),
        }
    }
}

/// Job store backed by Redis.
pub struct RedisJobStore {
    client: redis::Client,
    config: StoreConfig,
}

impl RedisJobStore {
    pub fn new(redis_url: &str, config: StoreConfig) -> StoreResult<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client, config })
    }

    fn key(&self, id: &JobId) -> String {
        format!("{}:job:{}", self.config.key_prefix, id)
    }

    fn ttl_secs(&self) -> u64 {
        self.config.record_ttl.as_secs().max(1)
    }
}

#[async_trait]
impl JobRepository for RedisJobStore {
    async fn insert(&self, job: &VideoJob) -> StoreResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(job)?;

        // SET NX replies nil when the key already exists
        let created: Option<String> = redis::cmd("SET")
            .arg(self.key(&job.id))
            .arg(payload)
            .arg("NX")
            .arg("EX")
            .arg(self.ttl_secs())
            .query_async(&mut conn)
            .await?;

        if created.is_none() {
            return Err(StoreError::already_exists(job.id.as_str()));
        }
        metrics::counter!("vguard_store_writes_total", "op" => "insert").increment(1);
        debug!(job_id = %job.id, "Inserted job record");
        Ok(())
    }

    async fn get(&self, id: &JobId) -> StoreResult<Option<VideoJob>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload: Option<String> = conn.get(self.key(id)).await?;
        payload
            .map(|p| serde_json::from_str(&p).map_err(StoreError::from))
            .transpose()
    }

    async fn save(&self, job: &VideoJob) -> StoreResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(job)?;

        // SET XX replies nil when the key is missing
        let updated: Option<String> = redis::cmd("SET")
            .arg(self.key(&job.id))
            .arg(payload)
            .arg("XX")
            .arg("EX")
            .arg(self.ttl_secs())
            .query_async(&mut conn)
            .await?;

        if updated.is_none() {
            return Err(StoreError::not_found(job.id.as_str()));
        }
        metrics::counter!("vguard_store_writes_total", "op" => "save").increment(1);
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vguard_models::{OrgId, ProbedMetadata, Stage};

    #[test]
    fn test_key_layout() {
        let store = RedisJobStore::new("redis://127.0.0.1:6379", StoreConfig::default()).unwrap();
        assert_eq!(store.key(&JobId::from_string("abc")), "vguard:job:abc");
    }

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_roundtrip() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        let store = RedisJobStore::new(&url, StoreConfig::default()).unwrap();
        store.ping().await.unwrap();

        let mut job = VideoJob::new(OrgId::from_string("acme"), "/uploads/a.mp4", ProbedMetadata::default());
        store.insert(&job).await.unwrap();
        assert!(matches!(store.insert(&job).await, Err(StoreError::AlreadyExists(_))));

        job.advance(Stage::Processing, 10).unwrap();
        store.save(&job).await.unwrap();
        let loaded = store.get(&job.id).await.unwrap().unwrap();
        assert_eq!(loaded.stage, Stage::Processing);
    }
}
