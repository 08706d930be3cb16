//! Analysis stage: sample frames, classify each, aggregate a verdict.

use std::path::Path;
use std::sync::Arc;

use vguard_media::{FrameExtractor, SamplingPlan};
use vguard_models::{ProbedMetadata, SensitivityVerdict};
use vguard_moderation::{AggregationInput, ContentClassifier, SensitivityAggregator};

use crate::error::PipelineResult;
use crate::logging::JobLogger;
use crate::progress::ANALYZING;
use crate::reporter::JobReporter;

/// Sampling, classification and aggregation for one job.
#[derive(Clone)]
pub struct AnalysisStage {
    extractor: Arc<dyn FrameExtractor>,
    classifier: ContentClassifier,
    aggregator: SensitivityAggregator,
}

impl AnalysisStage {
    pub fn new(extractor: Arc<dyn FrameExtractor>, classifier: ContentClassifier) -> Self {
        Self {
            extractor,
            classifier,
            aggregator: SensitivityAggregator::default(),
        }
    }

    pub fn with_aggregator(mut self, aggregator: SensitivityAggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    pub fn classifier(&self) -> &ContentClassifier {
        &self.classifier
    }

    /// Run the stage. Frame-level failures never fail the stage; only
    /// persistence errors propagate.
    pub async fn run(
        &self,
        reporter: &mut JobReporter,
        source: &Path,
        metadata: &ProbedMetadata,
        work_dir: &Path,
        logger: &JobLogger,
    ) -> PipelineResult<SensitivityVerdict> {
        let mut input = AggregationInput {
            backend_available: self.classifier.is_available(),
            duration: metadata.duration,
            size: metadata.size,
            ..Default::default()
        };

        if !input.backend_available {
            logger.log_warning("no classification backend; skipping frame sampling");
            return Ok(self.aggregator.aggregate(input));
        }

        let Some(plan) = SamplingPlan::for_duration(metadata.duration) else {
            logger.log_progress("video too short for frame sampling");
            return Ok(self.aggregator.aggregate(input));
        };
        input.frame_count = plan.frame_count;

        let frames = match self.extractor.extract(source, &plan, work_dir).await {
            Ok(frames) => frames,
            Err(e) => {
                logger.log_warning(&format!("frame extraction failed: {}", e));
                input.extraction_failed = true;
                return Ok(self.aggregator.aggregate(input));
            }
        };

        let total = plan.frame_count;
        for frame in frames {
            let record = self
                .classifier
                .classify_frame(frame.frame_number, frame.timestamp_seconds, frame.path())
                .await;
            // Scored or not, the frame file goes away now
            drop(frame);

            let progress = ANALYZING.map_fraction(record.frame_number, total);
            reporter.frame(record.clone(), total, progress).await?;
            input.frames.push(record);
        }

        let verdict = self.aggregator.aggregate(input);
        logger.log_progress(&format!(
            "analysis verdict {} ({:.2}) over {} frames",
            verdict.status.as_str(),
            verdict.confidence,
            verdict.frame_analysis.total_frames
        ));
        Ok(verdict)
    }
}
