//! Pipeline error types.

use thiserror::Error;

use vguard_events::ChannelError;
use vguard_media::{MediaError, MetadataError};
use vguard_models::TransitionError;
use vguard_store::StoreError;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Probe failed; no job was created.
    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("Transcode failed: {0}")]
    Transcode(MediaError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("{0}")]
    Transition(#[from] TransitionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn transcode(err: MediaError) -> Self {
        Self::Transcode(err)
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Metadata(_) => "metadata",
            PipelineError::Transcode(_) => "transcode",
            PipelineError::Media(_) => "media",
            PipelineError::Store(_) => "store",
            PipelineError::Channel(_) => "channel",
            PipelineError::Transition(_) => "transition",
            PipelineError::Io(_) => "io",
        }
    }
}
