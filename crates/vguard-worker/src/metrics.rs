//! Pipeline metrics.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_SUBMITTED_TOTAL: &str = "vguard_jobs_submitted_total";
    pub const JOBS_FINISHED_TOTAL: &str = "vguard_jobs_finished_total";
    pub const JOBS_FAILED_TOTAL: &str = "vguard_jobs_failed_total";
    pub const PROBE_FAILURES_TOTAL: &str = "vguard_probe_failures_total";
    pub const STAGE_DURATION_SECONDS: &str = "vguard_stage_duration_seconds";
    pub const JOB_DURATION_SECONDS: &str = "vguard_job_duration_seconds";
}

pub fn record_job_submitted() {
    counter!(names::JOBS_SUBMITTED_TOTAL).increment(1);
}

pub fn record_probe_failure(code: &'static str) {
    counter!(names::PROBE_FAILURES_TOTAL, "code" => code).increment(1);
}

/// Record a job ending in `completed` or `flagged`.
pub fn record_job_finished(stage: &'static str, duration_secs: f64) {
    counter!(names::JOBS_FINISHED_TOTAL, "stage" => stage).increment(1);
    histogram!(names::JOB_DURATION_SECONDS).record(duration_secs);
}

pub fn record_job_failed(kind: &'static str) {
    counter!(names::JOBS_FAILED_TOTAL, "kind" => kind).increment(1);
}

pub fn record_stage_duration(stage: &'static str, duration_secs: f64) {
    histogram!(names::STAGE_DURATION_SECONDS, "stage" => stage).record(duration_secs);
}
