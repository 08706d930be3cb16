//! Transcoding to the stream-optimized rendition.

use async_trait::async_trait;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::info;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Receives transcode completion in percent (0-100).
pub type PercentCallback = Box<dyn Fn(f64) + Send + 'static>;

/// Encoding settings for the derived rendition.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscodeSettings {
    pub codec: String,
    pub preset: String,
    pub crf: u8,
    pub audio_codec: String,
    pub audio_bitrate: String,
    pub pixel_format: String,
}

impl Default for TranscodeSettings {
    fn default() -> Self {
        Self {
            codec: "libx264".to_string(),
            preset: "medium".to_string(),
            crf: 23,
            audio_codec: "aac".to_string(),
            audio_bitrate: "128k".to_string(),
            pixel_format: "yuv420p".to_string(),
        }
    }
}

impl TranscodeSettings {
    fn apply(&self, cmd: FfmpegCommand) -> FfmpegCommand {
        cmd.video_codec(&self.codec)
            .preset(&self.preset)
            .crf(self.crf)
            .output_args(["-pix_fmt", self.pixel_format.as_str()])
            .audio_codec(&self.audio_codec)
            .audio_bitrate(&self.audio_bitrate)
            // Moov atom up front so playback can start before the download ends
            .output_args(["-movflags", "+faststart"])
    }
}

/// Produces the derived rendition of a source video.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Transcode `source` into `output`.
    ///
    /// `duration` is the probed source duration in seconds and is used to
    /// turn encoder progress into a percentage.
    async fn transcode(
        &self,
        source: &Path,
        output: &Path,
        duration: f64,
        on_percent: PercentCallback,
    ) -> MediaResult<()>;
}

/// FFmpeg-backed transcoder.
#[derive(Debug, Clone, Default)]
pub struct FfmpegTranscoder {
    settings: TranscodeSettings,
    timeout: Option<Duration>,
}

impl FfmpegTranscoder {
    pub fn new(settings: TranscodeSettings) -> Self {
        Self {
            settings,
            timeout: None,
        }
    }

    /// Bound the encoder runtime. `None` leaves it unbounded.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn settings(&self) -> &TranscodeSettings {
        &self.settings
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(
        &self,
        source: &Path,
        output: &Path,
        duration: f64,
        on_percent: PercentCallback,
    ) -> MediaResult<()> {
        if !source.exists() {
            return Err(MediaError::FileNotFound(source.to_path_buf()));
        }
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        info!(
            "Transcoding {} -> {} ({}, crf {})",
            source.display(),
            output.display(),
            self.settings.codec,
            self.settings.crf
        );

        let cmd = self.settings.apply(FfmpegCommand::new(source, output));
        let total_ms = (duration * 1000.0) as i64;
        let start = Instant::now();

        FfmpegRunner::new()
            .with_timeout(self.timeout)
            .run_with_progress(&cmd, move |progress| {
                on_percent(progress.percentage(total_ms));
            })
            .await?;

        let elapsed = start.elapsed();
        metrics::histogram!("vguard_transcode_duration_seconds").record(elapsed.as_secs_f64());
        info!("Transcode finished in {:.1}s: {}", elapsed.as_secs_f64(), output.display());

        Ok(())
    }
}
