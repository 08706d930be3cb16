//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during frame extraction and transcoding.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("Frame {frame} extraction failed: {message}")]
    FrameExtraction { frame: u32, message: String },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create a frame extraction error.
    pub fn frame_extraction(frame: u32, message: impl Into<String>) -> Self {
        Self::FrameExtraction {
            frame,
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

/// Metadata probe failures.
///
/// Each cause is surfaced differently to the uploader, so they stay distinct.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// ffprobe is not installed or could not be executed.
    #[error("metadata tool unavailable: {0}")]
    ToolUnavailable(String),

    /// The container has no decodable video stream.
    #[error("no decodable video stream found")]
    NoVideoStream,

    /// The file is corrupt, truncated or not a media file at all.
    #[error("invalid or corrupt media data: {0}")]
    InvalidData(String),
}

impl MetadataError {
    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            MetadataError::ToolUnavailable(_) => "metadata_tool_unavailable",
            MetadataError::NoVideoStream => "no_video_stream",
            MetadataError::InvalidData(_) => "invalid_media",
        }
    }
}
