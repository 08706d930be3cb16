//! FFmpeg CLI wrapper for the video pipeline.
//!
//! This crate provides:
//! - Metadata probing via ffprobe with a typed failure taxonomy
//! - Adaptive frame sampling plans and transient frame extraction
//! - Transcoding to a stream-optimized rendition with progress reporting
//! - Type-safe FFmpeg command building and `-progress pipe:2` parsing

pub mod command;
pub mod error;
pub mod frames;
pub mod probe;
pub mod progress;
pub mod transcode;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult, MetadataError};
pub use frames::{
    ExtractedFrame, FfmpegFrameExtractor, FrameExtractor, SamplingPlan, MAX_SAMPLED_FRAMES,
    MIN_ANALYSIS_DURATION_SECS,
};
pub use probe::{probe_video, FfprobeProbe, MetadataProbe, VideoInfo};
pub use progress::FfmpegProgress;
pub use transcode::{FfmpegTranscoder, PercentCallback, TranscodeSettings, Transcoder};
