//! In-process progress hub.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};

use vguard_models::{ProgressEvent, Topic};

use crate::broadcaster::{EventStream, ProgressBroadcaster};
use crate::error::ChannelResult;

/// Per-subscriber buffer. A subscriber further behind than this skips ahead.
const TOPIC_CAPACITY: usize = 64;

type TopicMap = RwLock<HashMap<Topic, broadcast::Sender<ProgressEvent>>>;

/// Broadcast hub with one `tokio::sync::broadcast` channel per topic.
#[derive(Debug)]
pub struct ProgressHub {
    topics: Arc<TopicMap>,
    capacity: usize,
}

impl Default for ProgressHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressHub {
    pub fn new() -> Self {
        Self::with_capacity(TOPIC_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            topics: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Number of topics with a live channel.
    pub async fn topic_count(&self) -> usize {
        self.topics.read().await.len()
    }

    /// Current subscribers of `topic`.
    pub async fn subscriber_count(&self, topic: &Topic) -> usize {
        self.topics
            .read()
            .await
            .get(topic)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl ProgressBroadcaster for ProgressHub {
    async fn publish(&self, topic: &Topic, event: &ProgressEvent) -> ChannelResult<()> {
        let mut topics = self.topics.write().await;

        let delivered = match topics.get(topic) {
            Some(tx) => tx.send(event.clone()).unwrap_or(0),
            None => 0,
        };

        // Nobody listening, or the job is over: the channel has no further use
        if delivered == 0 || event.is_terminal() {
            topics.remove(topic);
        }

        metrics::counter!("vguard_progress_events_published_total").increment(1);
        debug!(topic = %topic, stage = %event.stage, delivered, "Published progress event");
        Ok(())
    }

    async fn subscribe(&self, topic: &Topic) -> ChannelResult<EventStream> {
        let rx = {
            let mut topics = self.topics.write().await;
            topics.retain(|_, tx| tx.receiver_count() > 0);
            topics
                .entry(topic.clone())
                .or_insert_with(|| broadcast::channel(self.capacity).0)
                .subscribe()
        };

        let subscription = Subscription {
            rx,
            topic: topic.clone(),
            topics: Arc::downgrade(&self.topics),
        };
        let stream = futures_util::stream::unfold(subscription, |mut sub| async move {
            loop {
                match sub.rx.recv().await {
                    Ok(event) => return Some((event, sub)),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(topic = %sub.topic, "Progress subscriber lagged by {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });

        Ok(Box::pin(stream))
    }
}

/// Receiver side of one subscription. The last one to go removes its topic.
struct Subscription {
    rx: broadcast::Receiver<ProgressEvent>,
    topic: Topic,
    topics: Weak<TopicMap>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(topics) = self.topics.upgrade() else {
            return;
        };
        // Under contention the next subscribe sweeps it instead
        let Ok(mut topics) = topics.try_write() else {
            return;
        };
        // `self.rx` is still alive here and counts as one receiver
        if topics
            .get(&self.topic)
            .is_some_and(|tx| tx.receiver_count() <= 1)
        {
            topics.remove(&self.topic);
        }
    }
}
