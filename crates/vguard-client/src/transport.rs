//! Seams between the consumer and the network.

use async_trait::async_trait;

use vguard_models::{ClientMessage, JobId};

use crate::error::ClientResult;
use crate::wire::{IncomingMessage, StatusSnapshot};

/// Opens push connections to the progress endpoint.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn connect(&self) -> ClientResult<Box<dyn PushConnection>>;
}

/// One open push connection.
#[async_trait]
pub trait PushConnection: Send {
    async fn send(&mut self, message: &ClientMessage) -> ClientResult<()>;

    /// Next message, or `None` once the connection is gone.
    ///
    /// Must be cancel safe; the consumer races it against its command queue.
    async fn recv(&mut self) -> Option<ClientResult<IncomingMessage>>;
}

/// Direct job status queries.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// `Ok(None)` when the server does not know the job.
    async fn fetch(&self, job_id: &JobId) -> ClientResult<Option<StatusSnapshot>>;
}
