//! Progress events via Redis Pub/Sub.

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use redis::AsyncCommands;
use tracing::debug;

use vguard_models::{ProgressEvent, Topic};

use crate::broadcaster::{EventStream, ProgressBroadcaster};
use crate::error::ChannelResult;

/// Channel for publishing/subscribing to progress events across processes.
pub struct RedisProgressChannel {
    client: redis::Client,
}

impl RedisProgressChannel {
    /// Create a new progress channel.
    pub fn new(redis_url: &str) -> ChannelResult<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }

    /// Get the Redis channel name for a topic.
    pub fn channel_name(topic: &Topic) -> String {
        format!("vguard:progress:{}:{}", topic.org_id, topic.job_id)
    }
}

#[async_trait]
impl ProgressBroadcaster for RedisProgressChannel {
    async fn publish(&self, topic: &Topic, event: &ProgressEvent) -> ChannelResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let channel = Self::channel_name(topic);
        let payload = serde_json::to_string(event)?;

        debug!("Publishing progress event to {}", channel);
        let receivers: u64 = conn.publish(&channel, payload).await?;
        metrics::counter!("vguard_progress_events_published_total").increment(1);
        debug!(channel = %channel, receivers, "Published progress event");

        Ok(())
    }

    /// Subscribe to progress events for a job.
    ///
    /// The stream ends after the terminal event of the job.
    async fn subscribe(&self, topic: &Topic) -> ChannelResult<EventStream> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        let channel = Self::channel_name(topic);

        pubsub.subscribe(&channel).await?;

        let messages = pubsub.into_on_message().filter_map(|msg| async move {
            let payload: String = msg.get_payload().ok()?;
            serde_json::from_str::<ProgressEvent>(&payload).ok()
        });

        // Ends right after the terminal event instead of waiting for another message
        let stream = stream::unfold(Some(Box::pin(messages)), |state| async move {
            let mut messages = state?;
            let event = messages.next().await?;
            let rest = (!event.is_terminal()).then_some(messages);
            Some((event, rest))
        });

        Ok(Box::pin(stream))
    }
}
