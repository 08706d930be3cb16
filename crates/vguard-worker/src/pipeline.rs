//! Pipeline orchestrator.
//!
//! A job moves strictly forward through
//! `uploading -> processing -> analyzing -> compressing -> finalizing`
//! and ends in exactly one of `completed`, `flagged` or `failed`.
//! Submission returns once the job record exists; the run itself is a
//! detached task bounded by a job semaphore.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{info, Instrument};

use vguard_events::ProgressBroadcaster;
use vguard_media::{FrameExtractor, MetadataProbe, PercentCallback, Transcoder};
use vguard_models::{JobId, OrgId, Stage, VideoJob};
use vguard_moderation::ContentClassifier;
use vguard_store::JobRepository;

use crate::analysis::AnalysisStage;
use crate::config::WorkerConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::progress::{ANALYZING, COMPRESSING, FINALIZING_PROGRESS, PROCESSING_PROGRESS};
use crate::reporter::JobReporter;

/// Collaborators injected into the orchestrator.
pub struct PipelineDeps {
    pub store: Arc<dyn JobRepository>,
    pub broadcaster: Arc<dyn ProgressBroadcaster>,
    pub probe: Arc<dyn MetadataProbe>,
    pub extractor: Arc<dyn FrameExtractor>,
    pub classifier: ContentClassifier,
    pub transcoder: Arc<dyn Transcoder>,
}

/// A submitted job and the task running it.
pub struct JobHandle {
    /// Record as created, in stage `uploading`
    pub job: VideoJob,
    /// Resolves to the final record once the job is terminal
    pub task: JoinHandle<VideoJob>,
}

pub struct Orchestrator {
    config: WorkerConfig,
    store: Arc<dyn JobRepository>,
    broadcaster: Arc<dyn ProgressBroadcaster>,
    probe: Arc<dyn MetadataProbe>,
    analysis: AnalysisStage,
    transcoder: Arc<dyn Transcoder>,
    job_semaphore: Arc<Semaphore>,
}

impl Orchestrator {
    pub fn new(config: WorkerConfig, deps: PipelineDeps) -> Arc<Self> {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1)));
        info!(
            "Pipeline ready: {} concurrent jobs, classification backend {}",
            config.max_concurrent_jobs,
            deps.classifier.backend_name().unwrap_or("unavailable")
        );

        Arc::new(Self {
            config,
            store: deps.store,
            broadcaster: deps.broadcaster,
            probe: deps.probe,
            analysis: AnalysisStage::new(deps.extractor, deps.classifier),
            transcoder: deps.transcoder,
            job_semaphore,
        })
    }

    pub fn store(&self) -> &Arc<dyn JobRepository> {
        &self.store
    }

    pub fn broadcaster(&self) -> &Arc<dyn ProgressBroadcaster> {
        &self.broadcaster
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Probe the source, create the job record and start the pipeline.
    ///
    /// A metadata failure returns an error and creates no job.
    pub async fn submit(self: &Arc<Self>, org_id: OrgId, source_path: impl Into<PathBuf>) -> PipelineResult<JobHandle> {
        let source_path = source_path.into();

        let info = match self.probe.probe(&source_path).await {
            Ok(info) => info,
            Err(e) => {
                metrics::record_probe_failure(e.code());
                return Err(e.into());
            }
        };

        let job = VideoJob::new(org_id, source_path, info.into());
        self.store.insert(&job).await?;
        metrics::record_job_submitted();

        let logger = JobLogger::new(&job.id, &job.org_id, "video_pipeline");
        logger.log_start(&format!(
            "{} ({:.1}s, {}x{}, {})",
            job.source_path.display(),
            job.probed_metadata.duration,
            job.probed_metadata.width,
            job.probed_metadata.height,
            job.probed_metadata.codec
        ));

        let span = logger.create_span();
        let task = tokio::spawn(Arc::clone(self).run(job.clone(), logger).instrument(span));

        Ok(JobHandle { job, task })
    }

    async fn run(self: Arc<Self>, job: VideoJob, logger: JobLogger) -> VideoJob {
        // Closed only on shutdown; run anyway rather than strand the job
        let _permit = self.job_semaphore.clone().acquire_owned().await.ok();

        let started = Instant::now();
        let work_dir = self.config.job_work_dir(job.id.as_str());
        let derived_path = self.derived_path(&job.id);
        let mut reporter = JobReporter::new(job, Arc::clone(&self.store), Arc::clone(&self.broadcaster));

        match self.execute(&mut reporter, &work_dir, &derived_path, &logger).await {
            Ok(stage) => {
                metrics::record_job_finished(stage.as_str(), started.elapsed().as_secs_f64());
                logger.log_completion(&format!(
                    "{} in {:.1}s",
                    stage,
                    started.elapsed().as_secs_f64()
                ));
            }
            Err(e) => {
                logger.log_error(&format!("failed during {}: {}", reporter.job().stage, e));
                metrics::record_job_failed(e.kind());

                if let Err(persist_err) = reporter.fail().await {
                    logger.log_error(&format!("could not persist failed state: {}", persist_err));
                }
                remove_quietly(&derived_path).await;
            }
        }

        if let Err(e) = tokio::fs::remove_dir_all(&work_dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                logger.log_warning(&format!("could not remove work dir {}: {}", work_dir.display(), e));
            }
        }

        reporter.into_job()
    }

    async fn execute(
        &self,
        reporter: &mut JobReporter,
        work_dir: &Path,
        derived_path: &Path,
        logger: &JobLogger,
    ) -> PipelineResult<Stage> {
        let source = reporter.job().source_path.clone();
        let metadata = reporter.job().probed_metadata.clone();

        reporter.advance(Stage::Processing, PROCESSING_PROGRESS).await?;

        let stage_start = Instant::now();
        reporter
            .advance_with(Stage::Analyzing, ANALYZING.start, "Extracting frames")
            .await?;
        let verdict = self
            .analysis
            .run(reporter, &source, &metadata, work_dir, logger)
            .await?;
        metrics::record_stage_duration("analyzing", stage_start.elapsed().as_secs_f64());

        let stage_start = Instant::now();
        reporter
            .advance_with(Stage::Compressing, COMPRESSING.start, "Compressing")
            .await?;
        if let Some(parent) = derived_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        self.transcode(reporter, &source, derived_path, metadata.duration)
            .await?;
        metrics::record_stage_duration("compressing", stage_start.elapsed().as_secs_f64());
        logger.log_progress(&format!("rendition written to {}", derived_path.display()));

        reporter
            .advance_with(Stage::Finalizing, FINALIZING_PROGRESS, "Finalizing")
            .await?;
        reporter.finish(derived_path.to_path_buf(), verdict).await
    }

    /// Run the transcoder, forwarding its progress into the compressing window.
    async fn transcode(
        &self,
        reporter: &mut JobReporter,
        source: &Path,
        output: &Path,
        duration: f64,
    ) -> PipelineResult<()> {
        let (tx, mut rx) = mpsc::unbounded_channel::<f64>();
        let on_percent: PercentCallback = Box::new(move |percent| {
            let _ = tx.send(percent);
        });

        let transcode = self.transcoder.transcode(source, output, duration, on_percent);
        tokio::pin!(transcode);

        let result = loop {
            tokio::select! {
                result = &mut transcode => break result,
                Some(percent) = rx.recv() => {
                    report_transcode_progress(reporter, percent).await?;
                }
            }
        };

        while let Ok(percent) = rx.try_recv() {
            report_transcode_progress(reporter, percent).await?;
        }

        result.map_err(PipelineError::transcode)
    }

    fn derived_path(&self, job_id: &JobId) -> PathBuf {
        self.config.derived_dir.join(format!("{}.mp4", job_id))
    }
}

async fn report_transcode_progress(reporter: &mut JobReporter, percent: f64) -> PipelineResult<()> {
    reporter
        .progress(
            COMPRESSING.map(percent),
            Some(format!("Compressing {:.0}%", percent.clamp(0.0, 100.0))),
        )
        .await?;
    Ok(())
}

async fn remove_quietly(path: &Path) {
    let _ = tokio::fs::remove_file(path).await;
}
