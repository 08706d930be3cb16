//! Broadcaster interface.

use async_trait::async_trait;
use futures_util::Stream;
use std::pin::Pin;

use vguard_models::{ProgressEvent, Topic};

use crate::error::ChannelResult;

/// Events of one topic, in publish order.
pub type EventStream = Pin<Box<dyn Stream<Item = ProgressEvent> + Send>>;

/// Per-job, per-organization progress broadcast.
#[async_trait]
pub trait ProgressBroadcaster: Send + Sync {
    /// Deliver `event` to every current subscriber of `topic`.
    ///
    /// Never blocks on slow subscribers; events nobody listens to are dropped.
    async fn publish(&self, topic: &Topic, event: &ProgressEvent) -> ChannelResult<()>;

    /// Receive events published to `topic` from now on.
    async fn subscribe(&self, topic: &Topic) -> ChannelResult<EventStream>;
}
