//! Adaptive frame sampling and transient frame extraction.

use async_trait::async_trait;
use std::path::Path;
use std::time::Instant;
use tempfile::TempPath;
use tracing::debug;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Videos shorter than this are not sampled at all.
pub const MIN_ANALYSIS_DURATION_SECS: f64 = 3.0;

/// Upper bound on frames sampled per video.
pub const MAX_SAMPLED_FRAMES: u32 = 20;

/// Below this duration frames are taken every [`SHORT_INTERVAL_SECS`].
const SHORT_VIDEO_SECS: f64 = 10.0;
const SHORT_INTERVAL_SECS: f64 = 2.0;
const LONG_INTERVAL_SECS: f64 = 5.0;

/// Width frames are scaled down to before classification.
const FRAME_WIDTH: u32 = 640;

/// Which timestamps of a video get sampled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingPlan {
    pub duration: f64,
    pub interval_secs: f64,
    pub frame_count: u32,
}

impl SamplingPlan {
    /// Plan for a video of `duration` seconds.
    ///
    /// Returns `None` when the video is too short to analyze.
    pub fn for_duration(duration: f64) -> Option<Self> {
        if !duration.is_finite() || duration < MIN_ANALYSIS_DURATION_SECS {
            return None;
        }

        let interval_secs = if duration < SHORT_VIDEO_SECS {
            SHORT_INTERVAL_SECS
        } else {
            LONG_INTERVAL_SECS
        };

        let frame_count = ((duration / interval_secs).floor() as u32).clamp(1, MAX_SAMPLED_FRAMES);

        Some(Self {
            duration,
            interval_secs,
            frame_count,
        })
    }

    /// Timestamp of the `index`-th sample (0-based), kept inside the video.
    pub fn timestamp(&self, index: u32) -> f64 {
        let last_safe = (self.duration - 1.0).max(0.0);
        (index as f64 * self.interval_secs).min(last_safe)
    }

    /// Timestamp of 1-based frame number `frame_number`.
    pub fn timestamp_for_frame(&self, frame_number: u32) -> f64 {
        self.timestamp(frame_number.saturating_sub(1))
    }

    /// `(frame_number, timestamp)` pairs in sampling order.
    pub fn frames(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        (1..=self.frame_count).map(move |n| (n, self.timestamp_for_frame(n)))
    }
}

/// A still image extracted from the source video.
///
/// The backing file is removed when this value is dropped.
#[derive(Debug)]
pub struct ExtractedFrame {
    /// 1-based frame number within the job
    pub frame_number: u32,
    pub timestamp_seconds: f64,
    pub path: TempPath,
}

impl ExtractedFrame {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Extracts the frames of a sampling plan into `work_dir`.
///
/// Extraction is all-or-nothing: on error no frame files remain.
#[async_trait]
pub trait FrameExtractor: Send + Sync {
    async fn extract(
        &self,
        source: &Path,
        plan: &SamplingPlan,
        work_dir: &Path,
    ) -> MediaResult<Vec<ExtractedFrame>>;
}

/// FFmpeg-backed frame extractor writing scaled JPEGs.
#[derive(Debug, Clone, Default)]
pub struct FfmpegFrameExtractor {
    runner: FfmpegRunner,
}

impl FfmpegFrameExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    async fn extract_one(
        &self,
        source: &Path,
        work_dir: &Path,
        frame_number: u32,
        timestamp: f64,
    ) -> MediaResult<ExtractedFrame> {
        let path = tempfile::Builder::new()
            .prefix(&format!("frame-{:02}-", frame_number))
            .suffix(".jpg")
            .tempfile_in(work_dir)?
            .into_temp_path();

        let cmd = FfmpegCommand::new(source, &path)
            .seek(timestamp)
            .single_frame()
            .video_filter(format!("scale={}:-2", FRAME_WIDTH))
            .output_args(["-q:v", "3"]);

        self.runner
            .run(&cmd)
            .await
            .map_err(|e| MediaError::frame_extraction(frame_number, e.to_string()))?;

        let size = tokio::fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            return Err(MediaError::frame_extraction(frame_number, "no image written"));
        }

        Ok(ExtractedFrame {
            frame_number,
            timestamp_seconds: timestamp,
            path,
        })
    }
}

#[async_trait]
impl FrameExtractor for FfmpegFrameExtractor {
    async fn extract(
        &self,
        source: &Path,
        plan: &SamplingPlan,
        work_dir: &Path,
    ) -> MediaResult<Vec<ExtractedFrame>> {
        if !source.exists() {
            return Err(MediaError::FileNotFound(source.to_path_buf()));
        }
        tokio::fs::create_dir_all(work_dir).await?;

        let start = Instant::now();
        let mut frames = Vec::with_capacity(plan.frame_count as usize);
        for (frame_number, timestamp) in plan.frames() {
            // An early return drops the frames collected so far, deleting their files
            frames.push(self.extract_one(source, work_dir, frame_number, timestamp).await?);
        }

        debug!(
            count = frames.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Extracted frames from {}",
            source.display()
        );
        metrics::counter!("vguard_frames_extracted_total").increment(frames.len() as u64);

        Ok(frames)
    }
}
