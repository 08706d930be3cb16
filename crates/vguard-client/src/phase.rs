//! Normalized job phase used for control flow on the consumer side.
//!
//! The server's status field doubles as a human sentence at times
//! ("Analyzing frame 3/20"). Control flow only ever looks at [`Phase`];
//! the raw text is kept for display.

use std::fmt;

use vguard_models::Stage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    /// Nothing heard about the job yet
    #[default]
    Idle,
    Uploading,
    Processing,
    Analyzing,
    Compressing,
    Finalizing,
    Completed,
    Failed,
    Flagged,
    /// The job cannot be followed (unknown to the server)
    Error,
}

impl Phase {
    pub const ALL: [Phase; 10] = [
        Phase::Idle,
        Phase::Uploading,
        Phase::Processing,
        Phase::Analyzing,
        Phase::Compressing,
        Phase::Finalizing,
        Phase::Completed,
        Phase::Failed,
        Phase::Flagged,
        Phase::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Uploading => "uploading",
            Phase::Processing => "processing",
            Phase::Analyzing => "analyzing",
            Phase::Compressing => "compressing",
            Phase::Finalizing => "finalizing",
            Phase::Completed => "completed",
            Phase::Failed => "failed",
            Phase::Flagged => "flagged",
            Phase::Error => "error",
        }
    }

    /// Exact phase name, ignoring case and surrounding whitespace.
    pub fn parse(raw: &str) -> Option<Phase> {
        let raw = raw.trim();
        Phase::ALL
            .into_iter()
            .find(|phase| phase.as_str().eq_ignore_ascii_case(raw))
    }

    /// Exact name first, then the nearest phase by substring.
    ///
    /// Returns `None` for text that names no phase; callers keep the
    /// phase they had.
    pub fn infer(raw: &str) -> Option<Phase> {
        if let Some(phase) = Phase::parse(raw) {
            return Some(phase);
        }

        let lower = raw.to_lowercase();
        if lower.contains("analyzing") || lower.contains("extracting frame") {
            Some(Phase::Analyzing)
        } else if lower.contains("compress") {
            Some(Phase::Compressing)
        } else if lower.contains("final") {
            Some(Phase::Finalizing)
        } else {
            None
        }
    }

    /// Position in the forward-only sequence. All terminal phases share the last rank.
    pub fn rank(&self) -> u8 {
        match self {
            Phase::Idle => 0,
            Phase::Uploading => 1,
            Phase::Processing => 2,
            Phase::Analyzing => 3,
            Phase::Compressing => 4,
            Phase::Finalizing => 5,
            Phase::Completed | Phase::Failed | Phase::Flagged | Phase::Error => 6,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Phase::Completed | Phase::Failed | Phase::Flagged | Phase::Error
        )
    }

    /// Whether a view in this phase may move to `next`.
    pub fn accepts(&self, next: Phase) -> bool {
        !self.is_terminal() && next.rank() >= self.rank()
    }
}

impl From<Stage> for Phase {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Uploading => Phase::Uploading,
            Stage::Processing => Phase::Processing,
            Stage::Analyzing => Phase::Analyzing,
            Stage::Compressing => Phase::Compressing,
            Stage::Finalizing => Phase::Finalizing,
            Stage::Completed => Phase::Completed,
            Stage::Flagged => Phase::Flagged,
            Stage::Failed => Phase::Failed,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
