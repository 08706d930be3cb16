//! Application state.

use std::sync::Arc;

use tracing::info;

use vguard_events::{ProgressBroadcaster, ProgressHub, RedisProgressChannel};
use vguard_media::{FfmpegFrameExtractor, FfmpegTranscoder, FfprobeProbe, TranscodeSettings};
use vguard_moderation::{ContentClassifier, ModerationConfig};
use vguard_store::{JobRepository, MemoryJobStore, RedisJobStore, StoreConfig};
use vguard_worker::{Orchestrator, PipelineDeps, WorkerConfig};

use crate::auth::{OrgAuthorizer, SameOrgAuthorizer};
use crate::config::{ApiConfig, BackendKind};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub store: Arc<dyn JobRepository>,
    pub broadcaster: Arc<dyn ProgressBroadcaster>,
    pub orchestrator: Arc<Orchestrator>,
    pub authorizer: Arc<dyn OrgAuthorizer>,
}

impl AppState {
    /// Wire state around an existing orchestrator, sharing its store and channel.
    pub fn new(config: ApiConfig, orchestrator: Arc<Orchestrator>, authorizer: Arc<dyn OrgAuthorizer>) -> Self {
        Self {
            config,
            store: Arc::clone(orchestrator.store()),
            broadcaster: Arc::clone(orchestrator.broadcaster()),
            orchestrator,
            authorizer,
        }
    }

    /// Build the production pipeline from environment configuration.
    pub fn from_env(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let store: Arc<dyn JobRepository> = match config.store_backend {
            BackendKind::Memory => Arc::new(MemoryJobStore::new()),
            BackendKind::Redis => Arc::new(RedisJobStore::new(&config.redis_url, StoreConfig::from_env())?),
        };
        let broadcaster: Arc<dyn ProgressBroadcaster> = match config.channel_backend {
            BackendKind::Memory => Arc::new(ProgressHub::new()),
            BackendKind::Redis => Arc::new(RedisProgressChannel::new(&config.redis_url)?),
        };
        info!(
            "Job store: {:?}, progress channel: {:?}",
            config.store_backend, config.channel_backend
        );

        let worker = WorkerConfig::from_env();
        let transcoder = FfmpegTranscoder::new(TranscodeSettings::default()).with_timeout(worker.transcode_timeout);

        let orchestrator = Orchestrator::new(
            worker,
            PipelineDeps {
                store,
                broadcaster,
                probe: Arc::new(FfprobeProbe),
                extractor: Arc::new(FfmpegFrameExtractor::new()),
                classifier: ContentClassifier::from_config(&ModerationConfig::from_env()),
                transcoder: Arc::new(transcoder),
            },
        );

        Ok(Self::new(config, orchestrator, Arc::new(SameOrgAuthorizer)))
    }
}
