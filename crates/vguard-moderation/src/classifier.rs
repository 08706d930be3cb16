//! Per-frame classification bounded by a hard timeout.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use vguard_models::FrameRecord;

use crate::backend::{default_providers, select_backend, ContentBackend};
use crate::config::ModerationConfig;
use crate::error::ClassifierError;

/// Classifies sampled frames with the backend chosen at startup.
///
/// A single frame's failure never aborts the batch: timeouts and transport
/// errors become error records.
#[derive(Clone)]
pub struct ContentClassifier {
    backend: Option<Arc<dyn ContentBackend>>,
    frame_timeout: Duration,
}

impl ContentClassifier {
    pub fn new(backend: Option<Arc<dyn ContentBackend>>, frame_timeout: Duration) -> Self {
        Self {
            backend,
            frame_timeout,
        }
    }

    /// Resolve the backend from configuration using the default provider ranking.
    pub fn from_config(config: &ModerationConfig) -> Self {
        Self::new(
            select_backend(&default_providers(), config),
            config.frame_timeout,
        )
    }

    /// Classifier with no backend; every job is flagged for manual review.
    pub fn unavailable() -> Self {
        Self::new(None, Duration::from_secs(5))
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    pub fn backend_name(&self) -> Option<&'static str> {
        self.backend.as_ref().map(|b| b.name())
    }

    pub fn frame_timeout(&self) -> Duration {
        self.frame_timeout
    }

    /// Classify one frame. Always yields a record for `frame_number`.
    pub async fn classify_frame(&self, frame_number: u32, timestamp_seconds: f64, frame: &Path) -> FrameRecord {
        let Some(backend) = &self.backend else {
            return FrameRecord::error(frame_number, timestamp_seconds, "no detection backend configured");
        };

        let result = match tokio::time::timeout(self.frame_timeout, backend.classify(frame)).await {
            Ok(result) => result,
            Err(_) => Err(ClassifierError::Timeout(self.frame_timeout.as_millis() as u64)),
        };

        match result {
            Ok(verdict) => {
                metrics::counter!(
                    "vguard_frame_classifications_total",
                    "backend" => backend.name(),
                    "outcome" => "ok"
                )
                .increment(1);
                FrameRecord::scored(frame_number, timestamp_seconds, verdict)
            }
            Err(e) => {
                metrics::counter!(
                    "vguard_frame_classifications_total",
                    "backend" => backend.name(),
                    "outcome" => e.outcome()
                )
                .increment(1);
                warn!(frame = frame_number, backend = backend.name(), "Frame classification failed: {}", e);
                FrameRecord::error(frame_number, timestamp_seconds, e.to_string())
            }
        }
    }
}

impl std::fmt::Debug for ContentClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentClassifier")
            .field("backend", &self.backend_name())
            .field("frame_timeout", &self.frame_timeout)
            .finish()
    }
}
