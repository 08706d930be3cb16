//! In-memory application wiring for route tests.

use async_trait::async_trait;
use axum::Router;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use vguard_events::ProgressHub;
use vguard_media::{
    ExtractedFrame, FrameExtractor, MediaError, MediaResult, MetadataError, MetadataProbe, PercentCallback,
    SamplingPlan, Transcoder, VideoInfo,
};
use vguard_models::{JobId, OrgId, ProbedMetadata, VideoJob};
use vguard_store::JobRepository;
use vguard_moderation::ContentClassifier;
use vguard_store::MemoryJobStore;
use vguard_worker::{Orchestrator, PipelineDeps, WorkerConfig};

use crate::auth::SameOrgAuthorizer;
use crate::config::ApiConfig;
use crate::routes::create_router;
use crate::state::AppState;

/// Fails for paths naming a probe error, succeeds with an 8 s clip otherwise.
struct PathProbe;

#[async_trait]
impl MetadataProbe for PathProbe {
    async fn probe(&self, path: &Path) -> Result<VideoInfo, MetadataError> {
        let name = path.to_string_lossy();
        if name.contains("no-video-stream") {
            return Err(MetadataError::NoVideoStream);
        }
        if name.contains("tool-missing") {
            return Err(MetadataError::ToolUnavailable("ffprobe not found".to_string()));
        }
        Ok(VideoInfo {
            duration: 8.0,
            width: 1280,
            height: 720,
            fps: 30.0,
            codec: "h264".to_string(),
            size: 1024 * 1024,
            bitrate: 1_000_000,
            has_audio: false,
        })
    }
}

struct NoFrames;

#[async_trait]
impl FrameExtractor for NoFrames {
    async fn extract(&self, _source: &Path, _plan: &SamplingPlan, _work_dir: &Path) -> MediaResult<Vec<ExtractedFrame>> {
        Err(MediaError::internal("no extraction in route tests"))
    }
}

struct InstantTranscoder;

#[async_trait]
impl Transcoder for InstantTranscoder {
    async fn transcode(&self, _source: &Path, output: &Path, _duration: f64, on_percent: PercentCallback) -> MediaResult<()> {
        on_percent(100.0);
        tokio::fs::write(output, b"mp4").await?;
        Ok(())
    }
}

pub struct TestApp {
    pub store: Arc<MemoryJobStore>,
    pub hub: Arc<ProgressHub>,
    pub state: AppState,
    _dir: TempDir,
}

impl TestApp {
    /// No classification backend, so every job ends `flagged`.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryJobStore::new());
        let hub = Arc::new(ProgressHub::new());

        let orchestrator = Orchestrator::new(
            WorkerConfig {
                max_concurrent_jobs: 2,
                work_dir: dir.path().join("work"),
                derived_dir: dir.path().join("derived"),
                transcode_timeout: None,
            },
            PipelineDeps {
                store: store.clone(),
                broadcaster: hub.clone(),
                probe: Arc::new(PathProbe),
                extractor: Arc::new(NoFrames),
                classifier: ContentClassifier::unavailable(),
                transcoder: Arc::new(InstantTranscoder),
            },
        );
        let state = AppState::new(ApiConfig::default(), orchestrator, Arc::new(SameOrgAuthorizer));

        Self {
            store,
            hub,
            state,
            _dir: dir,
        }
    }

    pub fn router(&self) -> Router {
        create_router(self.state.clone(), None)
    }

    /// Submit a job for `org` and wait for it to reach its terminal stage.
    pub async fn finished_job(&self, org: &str) -> JobId {
        let handle = self
            .state
            .orchestrator
            .submit(OrgId::from_string(org), "/uploads/clip.mp4")
            .await
            .unwrap();
        handle.task.await.unwrap().id
    }

    /// Store a job for `org` that is still in its first stage.
    pub async fn pending_job(&self, org: &str) -> JobId {
        let job = VideoJob::new(OrgId::from_string(org), "/uploads/clip.mp4", ProbedMetadata::default());
        self.store.insert(&job).await.unwrap();
        job.id
    }
}
