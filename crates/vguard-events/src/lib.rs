//! Progress channel for video jobs.
//!
//! This crate provides:
//! - The [`ProgressBroadcaster`] interface handed to the pipeline at construction
//! - [`ProgressHub`], an in-process broadcast hub keyed by organization and job
//! - [`RedisProgressChannel`], the same contract over Redis Pub/Sub
//!
//! Delivery is at-most-once with no replay: a subscriber only sees events
//! published after it subscribed.

pub mod broadcaster;
pub mod error;
pub mod hub;
pub mod redis_channel;

pub use broadcaster::{EventStream, ProgressBroadcaster};
pub use error::{ChannelError, ChannelResult};
pub use hub::ProgressHub;
pub use redis_channel::RedisProgressChannel;
