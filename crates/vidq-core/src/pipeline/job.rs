//! Job records and run reports.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::collab::{ChatId, Surface, UserId};
use crate::error::JobError;
use crate::media::{JobKind, MediaSnapshot};

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

/// One accepted selection. Owns its snapshot; nothing outside the job mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: u64,
    pub user_id: UserId,
    pub chat_id: ChatId,
    pub kind: JobKind,
    pub variant_id: String,
    pub snapshot: MediaSnapshot,
    /// Where progress and the final error go.
    pub surface: Surface,
}

impl Job {
    pub fn new(
        user_id: UserId,
        kind: JobKind,
        variant_id: &str,
        snapshot: MediaSnapshot,
        surface: Surface,
    ) -> Self {
        Self {
            id: NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed),
            user_id,
            chat_id: surface.chat_id,
            kind,
            variant_id: variant_id.to_string(),
            snapshot,
            surface,
        }
    }

    /// Moves the job onto another status surface (used when it is queued).
    pub fn with_surface(mut self, surface: Surface) -> Self {
        self.surface = surface;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Admitting,
    Fetching,
    PostProcessing,
    ThumbnailPreparing,
    Splitting,
    Delivering,
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobPhase::Admitting => "admitting",
            JobPhase::Fetching => "fetching",
            JobPhase::PostProcessing => "post-processing",
            JobPhase::ThumbnailPreparing => "thumbnail",
            JobPhase::Splitting => "splitting",
            JobPhase::Delivering => "delivering",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
pub enum JobOutcome {
    Succeeded {
        parts: usize,
    },
    /// `phase` is `None` when the run died outside any phase (panic).
    Failed {
        phase: Option<JobPhase>,
        error: JobError,
    },
}

/// Terminal result of one pipeline run.
#[derive(Debug)]
pub struct JobReport {
    pub job_id: u64,
    pub user_id: UserId,
    pub surface: Surface,
    pub outcome: JobOutcome,
}

impl JobReport {
    pub fn succeeded(job: &Job, parts: usize) -> Self {
        Self {
            job_id: job.id,
            user_id: job.user_id,
            surface: job.surface,
            outcome: JobOutcome::Succeeded { parts },
        }
    }

    pub fn failed(job: &Job, phase: Option<JobPhase>, error: JobError) -> Self {
        Self {
            job_id: job.id,
            user_id: job.user_id,
            surface: job.surface,
            outcome: JobOutcome::Failed { phase, error },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, JobOutcome::Succeeded { .. })
    }

    pub fn error(&self) -> Option<&JobError> {
        match &self.outcome {
            JobOutcome::Failed { error, .. } => Some(error),
            JobOutcome::Succeeded { .. } => None,
        }
    }
}
