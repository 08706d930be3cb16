//! End-to-end pipeline runs against the real ffmpeg tools.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use vguard_events::ProgressHub;
use vguard_media::{FfmpegFrameExtractor, FfmpegTranscoder, FfprobeProbe, MetadataProbe, TranscodeSettings};
use vguard_models::{FrameVerdict, OrgId, SensitivityStatus, Stage};
use vguard_moderation::{ClassifierResult, ContentBackend, ContentClassifier};
use vguard_store::MemoryJobStore;
use vguard_worker::{Orchestrator, PipelineDeps, PipelineError, WorkerConfig};

/// Accepts every frame after checking it was really written.
struct InspectingBackend {
    seen: AtomicUsize,
}

#[async_trait]
impl ContentBackend for InspectingBackend {
    async fn classify(&self, frame: &Path) -> ClassifierResult<FrameVerdict> {
        let bytes = tokio::fs::read(frame).await.expect("frame file exists");
        assert!(!bytes.is_empty());
        self.seen.fetch_add(1, Ordering::SeqCst);
        Ok(FrameVerdict {
            confidence: 0.9,
            ..FrameVerdict::default()
        })
    }

    fn name(&self) -> &'static str {
        "inspecting"
    }
}

async fn make_clip(dir: &Path, seconds: u32) -> PathBuf {
    let output = dir.join("source.mp4");
    let status = tokio::process::Command::new("ffmpeg")
        .args(["-y", "-hide_banner", "-loglevel", "error", "-f", "lavfi", "-i"])
        .arg(format!("testsrc=duration={}:size=320x240:rate=25", seconds))
        .args(["-pix_fmt", "yuv420p"])
        .arg(&output)
        .status()
        .await
        .expect("ffmpeg runs");
    assert!(status.success());
    output
}

fn orchestrator(dir: &Path, backend: Option<Arc<dyn ContentBackend>>) -> Arc<Orchestrator> {
    Orchestrator::new(
        WorkerConfig {
            max_concurrent_jobs: 1,
            work_dir: dir.join("work"),
            derived_dir: dir.join("derived"),
            transcode_timeout: Some(Duration::from_secs(120)),
        },
        PipelineDeps {
            store: Arc::new(MemoryJobStore::new()),
            broadcaster: Arc::new(ProgressHub::new()),
            probe: Arc::new(FfprobeProbe),
            extractor: Arc::new(FfmpegFrameExtractor::new()),
            classifier: ContentClassifier::new(backend, Duration::from_secs(5)),
            transcoder: Arc::new(FfmpegTranscoder::new(TranscodeSettings::default())),
        },
    )
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_clean_clip_completes_with_rendition() {
    let dir = tempfile::tempdir().unwrap();
    let source = make_clip(dir.path(), 12).await;
    let backend = Arc::new(InspectingBackend {
        seen: AtomicUsize::new(0),
    });

    let orchestrator = orchestrator(dir.path(), Some(backend.clone()));
    let handle = orchestrator.submit(OrgId::from_string("acme"), &source).await.unwrap();
    let job = handle.task.await.unwrap();

    assert_eq!(job.stage, Stage::Completed);
    assert_eq!(job.overall_progress, 100);
    // 12 s samples every 5 s
    assert_eq!(backend.seen.load(Ordering::SeqCst), 2);
    let verdict = job.sensitivity_verdict.unwrap();
    assert_eq!(verdict.status, SensitivityStatus::Safe);
    assert_eq!(verdict.frame_analysis.total_frames, 2);

    let derived = job.derived_path.unwrap();
    let info = FfprobeProbe.probe(&derived).await.unwrap();
    assert_eq!(info.codec, "h264");
    assert!((info.duration - 12.0).abs() < 0.5);

    // Sampled frames do not outlive the job
    assert!(!dir.path().join("work").join(job.id.as_str()).exists());
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_no_backend_still_produces_rendition() {
    let dir = tempfile::tempdir().unwrap();
    let source = make_clip(dir.path(), 3).await;

    let orchestrator = orchestrator(dir.path(), None);
    let job = orchestrator
        .submit(OrgId::from_string("acme"), &source)
        .await
        .unwrap()
        .task
        .await
        .unwrap();

    assert_eq!(job.stage, Stage::Flagged);
    assert_eq!(job.sensitivity_verdict.unwrap().confidence, 0.5);
    assert!(job.derived_path.unwrap().exists());
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_corrupt_upload_is_rejected_before_job_creation() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("broken.mp4");
    tokio::fs::write(&source, b"definitely not a video").await.unwrap();

    let orchestrator = orchestrator(dir.path(), None);
    let result = orchestrator.submit(OrgId::from_string("acme"), &source).await;

    assert!(matches!(result, Err(PipelineError::Metadata(_))));
}
