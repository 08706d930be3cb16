//! Scripted collaborators for pipeline tests.

use async_trait::async_trait;
use futures_util::stream;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use vguard_events::{ChannelResult, EventStream, ProgressBroadcaster};
use vguard_media::{
    ExtractedFrame, FrameExtractor, MediaError, MediaResult, MetadataError, MetadataProbe, PercentCallback,
    SamplingPlan, Transcoder, VideoInfo,
};
use vguard_models::{FrameRecord, FrameVerdict, JobId, OrgId, ProgressEvent, Topic, VideoJob};
use vguard_moderation::{ClassifierError, ClassifierResult, ContentBackend, ContentClassifier};
use vguard_store::{JobRepository, MemoryJobStore, StoreError, StoreResult};

use crate::config::WorkerConfig;
use crate::error::PipelineResult;
use crate::pipeline::{JobHandle, Orchestrator, PipelineDeps};

pub struct FakeProbe {
    duration: f64,
    error: Mutex<Option<MetadataError>>,
}

impl FakeProbe {
    pub fn ok(duration: f64) -> Self {
        Self {
            duration,
            error: Mutex::new(None),
        }
    }

    pub fn failing(error: MetadataError) -> Self {
        Self {
            duration: 0.0,
            error: Mutex::new(Some(error)),
        }
    }
}

#[async_trait]
impl MetadataProbe for FakeProbe {
    async fn probe(&self, _path: &Path) -> Result<VideoInfo, MetadataError> {
        if let Some(error) = self.error.lock().unwrap().take() {
            return Err(error);
        }
        Ok(VideoInfo {
            duration: self.duration,
            width: 1280,
            height: 720,
            fps: 30.0,
            codec: "h264".to_string(),
            size: 4 * 1024 * 1024,
            bitrate: 2_000_000,
            has_audio: true,
        })
    }
}

/// Writes one real temp file per planned frame.
#[derive(Default)]
pub struct FakeExtractor {
    fail: bool,
    calls: AtomicU32,
}

impl FakeExtractor {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FrameExtractor for FakeExtractor {
    async fn extract(&self, _source: &Path, plan: &SamplingPlan, work_dir: &Path) -> MediaResult<Vec<ExtractedFrame>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(MediaError::frame_extraction(1, "decoder error"));
        }

        std::fs::create_dir_all(work_dir)?;
        let mut frames = Vec::new();
        for (frame_number, timestamp_seconds) in plan.frames() {
            let path = tempfile::Builder::new()
                .prefix(&format!("frame-{:02}-", frame_number))
                .suffix(".jpg")
                .tempfile_in(work_dir)?
                .into_temp_path();
            std::fs::write(&path, b"jpeg")?;
            frames.push(ExtractedFrame {
                frame_number,
                timestamp_seconds,
                path,
            });
        }
        Ok(frames)
    }
}

/// Reports 0..100 in quarters, then writes the output.
#[derive(Default)]
pub struct FakeTranscoder {
    fail: bool,
}

impl FakeTranscoder {
    pub fn failing() -> Self {
        Self { fail: true }
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn transcode(
        &self,
        _source: &Path,
        output: &Path,
        _duration: f64,
        on_percent: PercentCallback,
    ) -> MediaResult<()> {
        for percent in [0.0, 25.0, 50.0, 75.0] {
            on_percent(percent);
            tokio::task::yield_now().await;
        }
        if self.fail {
            return Err(MediaError::ffmpeg_failed("encoder crashed", None, Some(1)));
        }
        on_percent(100.0);
        tokio::fs::write(output, b"mp4").await?;
        Ok(())
    }
}

/// Answers by call order, which equals frame number for a sequential run.
#[derive(Default)]
pub struct ScriptedBackend {
    explicit: HashSet<u32>,
    failing: HashSet<u32>,
    calls: AtomicU32,
    leftovers: AtomicU32,
    seen: Mutex<Vec<PathBuf>>,
}

impl ScriptedBackend {
    pub fn clean() -> Self {
        Self::default()
    }

    pub fn explicit_on(frames: &[u32]) -> Self {
        Self {
            explicit: frames.iter().copied().collect(),
            ..Default::default()
        }
    }

    pub fn failing_on(frames: &[u32]) -> Self {
        Self {
            failing: frames.iter().copied().collect(),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Earlier frame files still on disk when a later frame was classified.
    pub fn leftover_frames_seen(&self) -> u32 {
        self.leftovers.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentBackend for ScriptedBackend {
    async fn classify(&self, frame: &Path) -> ClassifierResult<FrameVerdict> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut seen = self.seen.lock().unwrap();
            let leftover = seen.iter().filter(|p| p.exists()).count() as u32;
            self.leftovers.fetch_add(leftover, Ordering::SeqCst);
            seen.push(frame.to_path_buf());
        }

        if self.failing.contains(&n) {
            return Err(ClassifierError::RequestFailed("backend returned 500".to_string()));
        }
        let explicit = self.explicit.contains(&n);
        Ok(FrameVerdict {
            is_explicit: explicit,
            confidence: if explicit { 0.9 } else { 0.1 },
            ..Default::default()
        })
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Store that can reject the next write of a terminal record.
pub struct FlakyStore {
    inner: Arc<MemoryJobStore>,
    reject_terminal: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: Arc<MemoryJobStore>) -> Self {
        Self {
            inner,
            reject_terminal: AtomicBool::new(false),
        }
    }

    pub fn fail_next_terminal_save(&self) {
        self.reject_terminal.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl JobRepository for FlakyStore {
    async fn insert(&self, job: &VideoJob) -> StoreResult<()> {
        self.inner.insert(job).await
    }

    async fn get(&self, id: &JobId) -> StoreResult<Option<VideoJob>> {
        self.inner.get(id).await
    }

    async fn save(&self, job: &VideoJob) -> StoreResult<()> {
        if job.is_terminal() && self.reject_terminal.swap(false, Ordering::SeqCst) {
            return Err(StoreError::not_found(job.id.as_str()));
        }
        self.inner.save(job).await
    }
}

/// Records events and checks each one against the persisted record.
pub struct RecordingBroadcaster {
    store: Arc<dyn JobRepository>,
    events: Mutex<Vec<ProgressEvent>>,
    violations: Mutex<Vec<String>>,
}

impl RecordingBroadcaster {
    pub fn new(store: Arc<dyn JobRepository>) -> Self {
        Self {
            store,
            events: Mutex::new(Vec::new()),
            violations: Mutex::new(Vec::new()),
        }
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn events_for(&self, job_id: &JobId) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| &e.job_id == job_id)
            .cloned()
            .collect()
    }

    pub fn frame_records_for(&self, job_id: &JobId) -> Vec<FrameRecord> {
        self.events_for(job_id)
            .into_iter()
            .filter_map(|e| e.frame_record)
            .collect()
    }

    pub fn violations(&self) -> Vec<String> {
        self.violations.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProgressBroadcaster for RecordingBroadcaster {
    async fn publish(&self, _topic: &Topic, event: &ProgressEvent) -> ChannelResult<()> {
        match self.store.get(&event.job_id).await {
            Ok(Some(job)) if job.stage == event.stage && job.overall_progress == event.fraction_complete => {}
            other => self.violations.lock().unwrap().push(format!(
                "{} {}% published while store held {:?}",
                event.stage,
                event.fraction_complete,
                other.map(|j| j.map(|j| (j.stage, j.overall_progress)))
            )),
        }
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn subscribe(&self, _topic: &Topic) -> ChannelResult<EventStream> {
        Ok(Box::pin(stream::empty()))
    }
}

pub struct Harness {
    pub store: Arc<MemoryJobStore>,
    pub broadcaster: Arc<RecordingBroadcaster>,
    pub probe: Arc<FakeProbe>,
    pub extractor: Arc<FakeExtractor>,
    pub transcoder: Arc<FakeTranscoder>,
    pub backend: Arc<ScriptedBackend>,
    pub config: WorkerConfig,
    backend_enabled: bool,
    _dir: TempDir,
}

impl Harness {
    pub fn new(duration: f64) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = WorkerConfig {
            max_concurrent_jobs: 2,
            work_dir: dir.path().join("work"),
            derived_dir: dir.path().join("derived"),
            transcode_timeout: None,
        };
        let store = Arc::new(MemoryJobStore::new());

        Self {
            broadcaster: Arc::new(RecordingBroadcaster::new(store.clone())),
            store,
            probe: Arc::new(FakeProbe::ok(duration)),
            extractor: Arc::new(FakeExtractor::default()),
            transcoder: Arc::new(FakeTranscoder::default()),
            backend: Arc::new(ScriptedBackend::clean()),
            config,
            backend_enabled: false,
            _dir: dir,
        }
    }

    pub fn with_backend(mut self, backend: ScriptedBackend) -> Self {
        self.backend = Arc::new(backend);
        self.backend_enabled = true;
        self
    }

    pub fn with_extractor(mut self, extractor: FakeExtractor) -> Self {
        self.extractor = Arc::new(extractor);
        self
    }

    pub fn with_transcoder(mut self, transcoder: FakeTranscoder) -> Self {
        self.transcoder = Arc::new(transcoder);
        self
    }

    pub fn with_probe(mut self, probe: FakeProbe) -> Self {
        self.probe = Arc::new(probe);
        self
    }

    pub fn with_store(mut self, store: Arc<MemoryJobStore>) -> Self {
        self.broadcaster = Arc::new(RecordingBroadcaster::new(store.clone()));
        self.store = store;
        self
    }

    pub fn orchestrator(&self) -> Arc<Orchestrator> {
        let backend: Option<Arc<dyn ContentBackend>> = if self.backend_enabled {
            Some(self.backend.clone())
        } else {
            None
        };

        Orchestrator::new(
            self.config.clone(),
            PipelineDeps {
                store: self.store.clone(),
                broadcaster: self.broadcaster.clone(),
                probe: self.probe.clone(),
                extractor: self.extractor.clone(),
                classifier: ContentClassifier::new(backend, Duration::from_secs(5)),
                transcoder: self.transcoder.clone(),
            },
        )
    }

    pub async fn submit(&self) -> PipelineResult<JobHandle> {
        self.orchestrator()
            .submit(OrgId::from_string("acme"), "/uploads/clip.mp4")
            .await
    }
}
