//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent pipeline runs
    pub max_concurrent_jobs: usize,
    /// Root for per-job scratch directories (sampled frames)
    pub work_dir: PathBuf,
    /// Where stream-optimized renditions are written
    pub derived_dir: PathBuf,
    /// Upper bound on one transcode; `None` leaves it unbounded
    pub transcode_timeout: Option<Duration>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            work_dir: PathBuf::from("/tmp/vguard/work"),
            derived_dir: PathBuf::from("/tmp/vguard/derived"),
            transcode_timeout: Some(Duration::from_secs(3600)), // 1 hour
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            max_concurrent_jobs: std::env::var("WORKER_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(2),
            work_dir: std::env::var("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/tmp/vguard/work")),
            derived_dir: std::env::var("WORKER_DERIVED_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/tmp/vguard/derived")),
            transcode_timeout: parse_timeout(std::env::var("WORKER_TRANSCODE_TIMEOUT").ok()),
        }
    }

    /// Scratch directory of one job.
    pub fn job_work_dir(&self, job_id: &str) -> PathBuf {
        self.work_dir.join(job_id)
    }
}

/// Seconds; `0` disables the timeout, garbage falls back to the default.
fn parse_timeout(raw: Option<String>) -> Option<Duration> {
    match raw.and_then(|s| s.trim().parse::<u64>().ok()) {
        Some(0) => None,
        Some(secs) => Some(Duration::from_secs(secs)),
        None => Some(Duration::from_secs(3600)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcode_timeout_parsing() {
        assert_eq!(parse_timeout(None), Some(Duration::from_secs(3600)));
        assert_eq!(parse_timeout(Some("0".to_string())), None);
        assert_eq!(parse_timeout(Some("90".to_string())), Some(Duration::from_secs(90)));
        assert_eq!(parse_timeout(Some("soon".to_string())), Some(Duration::from_secs(3600)));
    }

    #[test]
    fn test_job_work_dir() {
        let config = WorkerConfig::default();
        assert_eq!(config.job_work_dir("abc"), PathBuf::from("/tmp/vguard/work/abc"));
    }
}
