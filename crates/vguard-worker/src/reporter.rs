//! Write-then-notify progress reporting for one job.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

use vguard_events::ProgressBroadcaster;
use vguard_models::{FrameRecord, ProgressEvent, SensitivityVerdict, Stage, Topic, VideoJob};
use vguard_store::JobRepository;

use crate::error::PipelineResult;

/// Owns the job record during a pipeline run.
///
/// Every change is persisted before the matching event is published, so a
/// status query is never behind an event consumer. Publish failures are
/// logged and otherwise ignored; observers reconcile by polling.
pub struct JobReporter {
    job: VideoJob,
    topic: Topic,
    store: Arc<dyn JobRepository>,
    broadcaster: Arc<dyn ProgressBroadcaster>,
}

impl JobReporter {
    pub fn new(job: VideoJob, store: Arc<dyn JobRepository>, broadcaster: Arc<dyn ProgressBroadcaster>) -> Self {
        let topic = Topic::new(job.org_id.clone(), job.id.clone());
        Self {
            job,
            topic,
            store,
            broadcaster,
        }
    }

    pub fn job(&self) -> &VideoJob {
        &self.job
    }

    pub fn into_job(self) -> VideoJob {
        self.job
    }

    /// Enter `stage` with at least `progress`.
    pub async fn advance(&mut self, stage: Stage, progress: u8) -> PipelineResult<()> {
        self.advance_inner(stage, progress, None).await
    }

    /// Enter `stage` with a human readable status.
    pub async fn advance_with(&mut self, stage: Stage, progress: u8, display: impl Into<String>) -> PipelineResult<()> {
        self.advance_inner(stage, progress, Some(display.into())).await
    }

    async fn advance_inner(&mut self, stage: Stage, progress: u8, display: Option<String>) -> PipelineResult<()> {
        self.job.advance(stage, progress)?;
        self.store.save(&self.job).await?;

        let mut event = ProgressEvent::stage(self.job.id.clone(), stage, self.job.overall_progress);
        event.display_status = display;
        self.publish(event).await;
        Ok(())
    }

    /// Raise progress within the current stage. Nothing is written or sent
    /// unless the integer progress actually increases.
    pub async fn progress(&mut self, progress: u8, display: Option<String>) -> PipelineResult<bool> {
        if !self.job.set_progress(progress) {
            return Ok(false);
        }
        self.store.save(&self.job).await?;

        let mut event = ProgressEvent::stage(self.job.id.clone(), self.job.stage, self.job.overall_progress);
        event.display_status = display;
        self.publish(event).await;
        Ok(true)
    }

    /// Report one classified frame during analysis.
    pub async fn frame(&mut self, record: FrameRecord, total_frames: u32, progress: u8) -> PipelineResult<()> {
        self.job.set_progress(progress);
        self.store.save(&self.job).await?;

        let event = ProgressEvent::frame(self.job.id.clone(), self.job.overall_progress, record, total_frames);
        self.publish(event).await;
        Ok(())
    }

    /// Persist the verdict and rendition, then emit the terminal event.
    pub async fn finish(&mut self, derived_path: PathBuf, verdict: SensitivityVerdict) -> PipelineResult<Stage> {
        let status = verdict.status;
        let mut next = self.job.clone();
        let terminal = next.finish(derived_path, verdict)?;
        self.commit(next).await?;

        self.publish(ProgressEvent::terminal(self.job.id.clone(), terminal, Some(status)))
            .await;
        Ok(terminal)
    }

    /// Move the job to `failed`. Returns false if it was already terminal.
    pub async fn fail(&mut self) -> PipelineResult<bool> {
        let mut next = self.job.clone();
        if !next.fail() {
            return Ok(false);
        }
        self.commit(next).await?;

        self.publish(ProgressEvent::terminal(self.job.id.clone(), Stage::Failed, None))
            .await;
        Ok(true)
    }

    /// Terminal states only replace the in-memory record once stored, so a
    /// failed write leaves `fail` available.
    async fn commit(&mut self, next: VideoJob) -> PipelineResult<()> {
        self.store.save(&next).await?;
        self.job = next;
        Ok(())
    }

    async fn publish(&self, event: ProgressEvent) {
        if let Err(e) = self.broadcaster.publish(&self.topic, &event).await {
            warn!(
                job_id = %self.job.id,
                stage = %event.stage,
                "Progress event not delivered: {}", e
            );
        }
    }
}
