//! Reduction of per-frame records to one job-level sensitivity verdict.

use vguard_models::{FrameAnalysis, FrameRecord, SensitivityStatus, SensitivityVerdict};

/// Durations below this are never sampled.
const MIN_DURATION_SECS: f64 = 3.0;

/// Everything the aggregator looks at for one job.
#[derive(Debug, Clone, Default)]
pub struct AggregationInput {
    /// Whether a classification backend was available
    pub backend_available: bool,
    /// Probed duration in seconds
    pub duration: f64,
    /// Source file size in bytes
    pub size: u64,
    /// Frames the sampling plan asked for
    pub frame_count: u32,
    /// Frame extraction failed as a whole
    pub extraction_failed: bool,
    /// Records in frame order; error frames included
    pub frames: Vec<FrameRecord>,
}

/// Turns frame records into a [`SensitivityVerdict`].
#[derive(Debug, Clone)]
pub struct SensitivityAggregator {
    /// Ratio of positive frames above which a job is flagged outright
    pub ratio_threshold: f64,
    /// Advisory size limit in bytes
    pub large_file_bytes: u64,
    /// Advisory duration limit in seconds
    pub long_video_secs: f64,
}

impl Default for SensitivityAggregator {
    fn default() -> Self {
        Self {
            ratio_threshold: 0.15,
            large_file_bytes: 200 * 1024 * 1024,
            long_video_secs: 3600.0,
        }
    }
}

impl SensitivityAggregator {
    pub fn aggregate(&self, input: AggregationInput) -> SensitivityVerdict {
        let mut verdict = self.decide(input.clone());
        verdict.reasons.extend(self.advisories(&input));
        verdict
    }

    fn decide(&self, input: AggregationInput) -> SensitivityVerdict {
        if !input.backend_available {
            return SensitivityVerdict::without_frames(
                SensitivityStatus::Flagged,
                0.5,
                "no detection backend configured — manual review required",
            );
        }

        if input.duration < MIN_DURATION_SECS {
            return SensitivityVerdict::without_frames(
                SensitivityStatus::Safe,
                0.3,
                "duration too short for analysis",
            );
        }

        if input.extraction_failed || input.frames.is_empty() {
            return SensitivityVerdict::without_frames(
                SensitivityStatus::Flagged,
                0.5,
                "frame extraction failed — manual review required",
            );
        }

        let mut frames = input.frames;
        frames.sort_by_key(|f| f.frame_number);

        let total = (input.frame_count as usize).max(frames.len()) as u32;
        let explicit = frames.iter().filter(|f| f.verdict.is_explicit).count() as u32;
        let violent = frames.iter().filter(|f| f.verdict.is_violent).count() as u32;
        let errors = frames.iter().filter(|f| f.is_error()).count() as u32;

        let analysis = FrameAnalysis {
            total_frames: frames.len() as u32,
            explicit_frames: explicit,
            violent_frames: violent,
            frame_results: frames,
        };

        if errors == analysis.total_frames {
            return SensitivityVerdict {
                status: SensitivityStatus::Flagged,
                confidence: 0.5,
                reasons: vec!["no frame could be classified — manual review required".to_string()],
                frame_analysis: analysis,
            };
        }

        let explicit_ratio = explicit as f64 / total as f64;
        let violent_ratio = violent as f64 / total as f64;
        let max_ratio = explicit_ratio.max(violent_ratio);

        let mut reasons = Vec::new();
        let (status, confidence) = if max_ratio > self.ratio_threshold {
            if explicit > 0 {
                reasons.push(format!(
                    "explicit content detected in {}",
                    share(explicit, total)
                ));
            }
            if violent > 0 {
                reasons.push(format!(
                    "violent content detected in {}",
                    share(violent, total)
                ));
            }
            (SensitivityStatus::Flagged, max_ratio)
        } else if explicit > 0 || violent > 0 {
            if explicit > 0 {
                reasons.push(format!(
                    "possible explicit content in {} below threshold — manual review required",
                    share(explicit, total)
                ));
            }
            if violent > 0 {
                reasons.push(format!(
                    "possible violent content in {} below threshold — manual review required",
                    share(violent, total)
                ));
            }
            (SensitivityStatus::Flagged, 0.7)
        } else {
            reasons.push(format!("no sensitive content detected in {} frames", total));
            (SensitivityStatus::Safe, 0.85)
        };

        if errors > 0 {
            reasons.push(format!("{} could not be classified", share(errors, total)));
        }

        SensitivityVerdict {
            status,
            confidence,
            reasons,
            frame_analysis: analysis,
        }
    }

    fn advisories(&self, input: &AggregationInput) -> Vec<String> {
        let mut reasons = Vec::new();
        if input.size > self.large_file_bytes {
            reasons.push(format!(
                "large file ({:.1} MB) — advisory only",
                input.size as f64 / (1024.0 * 1024.0)
            ));
        }
        if input.duration > self.long_video_secs {
            reasons.push(format!(
                "long video ({:.0}s) — advisory only",
                input.duration
            ));
        }
        reasons
    }
}

/// "1 of 4 frames (25.0%)"
fn share(count: u32, total: u32) -> String {
    format!(
        "{} of {} frames ({:.1}%)",
        count,
        total,
        count as f64 * 100.0 / total as f64
    )
}
