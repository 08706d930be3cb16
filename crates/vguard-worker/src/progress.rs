//! Mapping of stage-local progress onto overall job progress.

/// Overall progress once the pipeline picked the job up.
pub const PROCESSING_PROGRESS: u8 = 10;

/// Overall progress while the verdict and rendition are persisted.
pub const FINALIZING_PROGRESS: u8 = 95;

/// Analysis spans [30, 50] of the job.
pub const ANALYZING: ProgressWindow = ProgressWindow::new(30, 50);

/// Transcoding spans [50, 90] of the job.
pub const COMPRESSING: ProgressWindow = ProgressWindow::new(50, 90);

/// Slice of overall progress owned by one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressWindow {
    pub start: u8,
    pub end: u8,
}

impl ProgressWindow {
    pub const fn new(start: u8, end: u8) -> Self {
        Self { start, end }
    }

    /// Map stage-local percent (0-100) into this window.
    pub fn map(&self, percent: f64) -> u8 {
        let percent = if percent.is_finite() {
            percent.clamp(0.0, 100.0)
        } else {
            0.0
        };
        let span = f64::from(self.end - self.start);
        self.start + (span * percent / 100.0).floor() as u8
    }

    /// Progress after `done` of `total` units.
    pub fn map_fraction(&self, done: u32, total: u32) -> u8 {
        if total == 0 {
            return self.end;
        }
        self.map(f64::from(done) * 100.0 / f64::from(total))
    }
}
