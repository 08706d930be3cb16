//! Pure merge of incoming updates into the reconciled view of a job.
//!
//! Push events and poll snapshots arrive in any order and either may be
//! missing entirely. [`merge`] is the only place that decides how a new
//! piece of information changes a [`JobView`].

use vguard_models::{FrameRecord, JobId, SensitivityStatus, SensitivityVerdict};

use crate::phase::Phase;
use crate::wire::{PushEvent, StatusSnapshot};

/// One incoming piece of job state, from either channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    /// Raw status text as sent by the server
    pub raw_status: Option<String>,
    pub display_status: Option<String>,
    pub progress: Option<f64>,
    pub current_frame: Option<u32>,
    pub total_frames: Option<u32>,
    pub frames: Vec<FrameRecord>,
    pub sensitivity_status: Option<SensitivityStatus>,
    pub verdict: Option<SensitivityVerdict>,
    pub derived_path: Option<String>,
}

impl Update {
    /// The server does not know the job (or will not show it to us).
    pub fn not_found() -> Self {
        Self {
            raw_status: Some(Phase::Error.as_str().to_string()),
            display_status: Some("Job not found".to_string()),
            ..Self::default()
        }
    }
}

impl From<PushEvent> for Update {
    fn from(event: PushEvent) -> Self {
        Self {
            raw_status: event.stage,
            display_status: event.display_status,
            progress: event.fraction_complete,
            current_frame: event.current_frame,
            total_frames: event.total_frames,
            frames: event.frame_record.into_iter().collect(),
            sensitivity_status: event.sensitivity_status,
            verdict: None,
            derived_path: None,
        }
    }
}

impl From<StatusSnapshot> for Update {
    fn from(snapshot: StatusSnapshot) -> Self {
        let frames = snapshot
            .sensitivity_verdict
            .as_ref()
            .map(|v| v.frame_analysis.frame_results.clone())
            .unwrap_or_default();

        Self {
            raw_status: snapshot.stage,
            display_status: None,
            progress: snapshot.overall_progress,
            current_frame: None,
            total_frames: None,
            frames,
            sensitivity_status: snapshot.sensitivity_verdict.as_ref().map(|v| v.status),
            verdict: snapshot.sensitivity_verdict,
            derived_path: snapshot.derived_path,
        }
    }
}

/// Reconciled state of one observed job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobView {
    pub job_id: JobId,
    /// Drives all control flow
    pub phase: Phase,
    /// Presentation only
    pub display_status: Option<String>,
    /// Overall progress (0-100), never decreasing
    pub progress: f64,
    pub current_frame: Option<u32>,
    pub total_frames: Option<u32>,
    /// Frame records received so far, sorted by frame number
    pub frames: Vec<FrameRecord>,
    pub sensitivity_status: Option<SensitivityStatus>,
    pub verdict: Option<SensitivityVerdict>,
    pub derived_path: Option<String>,
}

impl JobView {
    pub fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            phase: Phase::Idle,
            display_status: None,
            progress: 0.0,
            current_frame: None,
            total_frames: None,
            frames: Vec::new(),
            sensitivity_status: None,
            verdict: None,
            derived_path: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }
}

/// Fold `update` into `prior`.
///
/// Phase only moves forward and stops at a terminal phase. An update whose
/// phase is behind the current one is stale: it cannot change phase or
/// presentation fields, but the facts it carries (frames, verdict,
/// rendition path) are still kept. Frames are accumulated by frame number
/// and never dropped.
pub fn merge(prior: &JobView, update: &Update) -> JobView {
    let mut next = prior.clone();

    let incoming = update.raw_status.as_deref().and_then(Phase::infer);
    let stale = match incoming {
        Some(phase) => !prior.phase.accepts(phase),
        None => prior.is_terminal(),
    };

    if !stale {
        if let Some(phase) = incoming {
            next.phase = phase;
        }

        next.display_status = match (&update.display_status, &update.raw_status) {
            (Some(display), _) => Some(display.clone()),
            (None, Some(raw)) if Phase::parse(raw).is_none() => Some(raw.clone()),
            _ if next.phase != prior.phase => None,
            _ => prior.display_status.clone(),
        };

        if update.current_frame.is_some() {
            next.current_frame = update.current_frame;
        }
        if update.total_frames.is_some() {
            next.total_frames = update.total_frames;
        }
    }

    if let Some(progress) = update.progress {
        next.progress = next.progress.max(progress.clamp(0.0, 100.0));
    }

    for record in &update.frames {
        match next
            .frames
            .iter_mut()
            .find(|held| held.frame_number == record.frame_number)
        {
            Some(held) => *held = record.clone(),
            None => next.frames.push(record.clone()),
        }
    }
    next.frames.sort_by_key(|f| f.frame_number);

    if update.sensitivity_status.is_some() {
        next.sensitivity_status = update.sensitivity_status;
    }
    if update.verdict.is_some() {
        next.verdict = update.verdict.clone();
    }
    if update.derived_path.is_some() {
        next.derived_path = update.derived_path.clone();
    }

    next
}
