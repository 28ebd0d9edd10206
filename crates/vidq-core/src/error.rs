//! Error taxonomy and the best-effort tier.
//!
//! `SelectionError` ends a single menu interaction. `JobError` aborts a job at
//! a phase boundary and carries the user-facing message for its category.
//! Everything routed through [`best_effort`] is logged and dropped.

use thiserror::Error;

use crate::storage::SplitError;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("no pending request for this menu")]
    NotFound,
    #[error("a quality was already chosen for this request")]
    AlreadySelected,
    #[error("unknown variant {0}")]
    UnknownVariant(String),
    #[error("no usable variant")]
    NoUsableVariant,
}

impl SelectionError {
    pub fn user_message(&self) -> &'static str {
        match self {
            SelectionError::NotFound => "This request has expired, please send the link again.",
            SelectionError::AlreadySelected => "A quality was already chosen for this request.",
            SelectionError::UnknownVariant(_) => "That option is not available.",
            SelectionError::NoUsableVariant => "No suitable video format found.",
        }
    }
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("insufficient storage: need {needed} bytes free, have {available}")]
    InsufficientStorage { needed: u64, available: u64 },
    #[error("fetch failed: {0:#}")]
    Fetch(#[source] anyhow::Error),
    #[error("audio transcode failed: {0:#}")]
    Transcode(#[source] anyhow::Error),
    #[error("split failed: {0}")]
    Split(#[from] SplitError),
    #[error("delivery of part {part} failed: {source:#}")]
    Delivery {
        part: usize,
        #[source]
        source: anyhow::Error,
    },
    #[error("unexpected failure: {0:#}")]
    Unexpected(#[source] anyhow::Error),
}

impl JobError {
    /// Category name for logs.
    pub fn category(&self) -> &'static str {
        match self {
            JobError::InsufficientStorage { .. } => "InsufficientStorage",
            JobError::Fetch(_) => "FetchError",
            JobError::Transcode(_) => "TranscodeError",
            JobError::Split(_) => "SplitError",
            JobError::Delivery { .. } => "DeliveryError",
            JobError::Unexpected(_) => "UnexpectedError",
        }
    }

    /// Text rendered on the job's status surface. Never includes diagnostics.
    pub fn user_message(&self) -> &'static str {
        match self {
            JobError::InsufficientStorage { .. } => {
                "Not enough free disk space to download this file right now."
            }
            JobError::Fetch(_) => "An error occurred while downloading.",
            JobError::Transcode(_) => "An error occurred while converting the audio.",
            JobError::Split(_) => "An error occurred while splitting the file into parts.",
            JobError::Delivery { .. } => "An error occurred while sending the file.",
            JobError::Unexpected(_) => "An unexpected error occurred during processing.",
        }
    }
}

/// Runs the best-effort tier: logs a failure with `what` and returns `None`.
pub fn best_effort<T>(what: &str, result: anyhow::Result<T>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!("{} failed (ignored): {:#}", what, e);
            None
        }
    }
}
