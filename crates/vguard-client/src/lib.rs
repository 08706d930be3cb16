//! Remote progress consumer for VidGuard jobs.
//!
//! Follows jobs over the progress WebSocket and reconciles what it hears
//! with direct status queries, so a job's terminal state is observed even
//! when pushed events are missed, reordered or the connection drops.
//!
//! ```no_run
//! use vguard_client::{ConsumerConfig, ProgressConsumer};
//! use vguard_models::JobId;
//!
//! # async fn run() -> vguard_client::ClientResult<()> {
//! let consumer = ProgressConsumer::from_config(ConsumerConfig::from_env())?;
//! let mut watch = consumer.watch(JobId::from_string("job-id")).await;
//! let view = watch.wait_terminal().await?;
//! println!("{} finished as {}", view.job_id, view.phase);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod consumer;
pub mod error;
pub mod http;
pub mod intents;
pub mod phase;
pub mod reducer;
pub mod transport;
pub mod wire;
pub mod ws;

#[cfg(test)]
mod test_support;

pub use config::ConsumerConfig;
pub use consumer::{JobWatch, ProgressConsumer};
pub use error::{ClientError, ClientResult};
pub use http::HttpStatusSource;
pub use intents::SubscriptionIntents;
pub use phase::Phase;
pub use reducer::{merge, JobView, Update};
pub use transport::{PushConnection, PushTransport, StatusSource};
pub use wire::{IncomingMessage, PushEvent, StatusSnapshot};
pub use ws::WsTransport;
