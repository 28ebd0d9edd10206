//! Job pipeline: admission, fetch, post-processing, thumbnail, split, delivery.
//!
//! A run never returns early without a [`JobReport`]; the scheduler settles the
//! report (clears or annotates the status surface) after it has advanced.

mod job;
mod progress_worker;
mod run;
mod thumbnail;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::collab::{DiskStat, Fetcher, MessagingHost, Transcoder};
use crate::config::VidqConfig;
use crate::error::best_effort;
use crate::scheduler::JobRunner;
use crate::storage::SplitPolicy;

pub use job::{Job, JobOutcome, JobPhase, JobReport};

pub const DOWNLOAD_STARTED: &str = "Download started...";
pub const DOWNLOAD_FINISHED: &str = "Download finished, processing file...";
pub const SPLITTING: &str = "File is larger than the delivery limit, splitting into parts...";
pub const UPLOAD_STARTED: &str = "Starting upload...";
pub const UPLOAD_STARTED_PARTS: &str = "Starting upload (in parts)...";

/// Tunables for one pipeline, taken from config.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub progress_interval: Duration,
    pub delivery_ceiling: u64,
    pub split_policy: SplitPolicy,
    /// Parent of the per-job temporary directories.
    pub work_dir: PathBuf,
}

impl PipelineSettings {
    pub fn from_config(cfg: &VidqConfig) -> Self {
        Self {
            progress_interval: cfg.progress_interval(),
            delivery_ceiling: cfg.delivery_ceiling_bytes,
            split_policy: cfg.split_policy,
            work_dir: cfg.work_dir(),
        }
    }
}

/// Collaborators a pipeline run talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub fetcher: Arc<dyn Fetcher>,
    pub transcoder: Arc<dyn Transcoder>,
    pub host: Arc<dyn MessagingHost>,
    pub disk: Arc<dyn DiskStat>,
}

pub struct JobPipeline {
    collab: Collaborators,
    settings: PipelineSettings,
}

impl JobPipeline {
    pub fn new(collab: Collaborators, settings: PipelineSettings) -> Self {
        Self { collab, settings }
    }
}

#[async_trait]
impl JobRunner for JobPipeline {
    async fn run(&self, job: Job) -> JobReport {
        let mut phase = JobPhase::Admitting;
        match self.execute(&job, &mut phase).await {
            Ok(parts) => JobReport::succeeded(&job, parts),
            Err(error) => JobReport::failed(&job, Some(phase), error),
        }
    }

    async fn settle(&self, report: &JobReport) {
        let host = &self.collab.host;
        match &report.outcome {
            JobOutcome::Succeeded { parts } => {
                tracing::info!(
                    job_id = report.job_id,
                    user_id = report.user_id,
                    parts,
                    "job succeeded"
                );
                best_effort("remove status surface", host.remove_status(&report.surface).await);
            }
            JobOutcome::Failed { phase, error } => {
                tracing::error!(
                    job_id = report.job_id,
                    user_id = report.user_id,
                    phase = ?phase,
                    category = error.category(),
                    "job failed: {}",
                    error
                );
                best_effort(
                    "render failure",
                    host.render_status(&report.surface, error.user_message()).await,
                );
            }
        }
    }
}
