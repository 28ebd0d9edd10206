//! Phase sequence of a single run.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};

use crate::collab::{Delivery, FetchRequest};
use crate::error::{best_effort, JobError};
use crate::media::{caption, sanitize_filename, JobKind};
use crate::storage::{admit, split_file, Part};

use super::progress_worker::{OffsetSink, PhaseProgress};
use super::{thumbnail, Job, JobPhase, JobPipeline};
use super::{DOWNLOAD_FINISHED, DOWNLOAD_STARTED, SPLITTING, UPLOAD_STARTED, UPLOAD_STARTED_PARTS};

impl JobPipeline {
    /// Runs every phase in order; `phase` holds the last phase entered.
    /// The temporary directory is dropped (and removed) on every return path.
    pub(super) async fn execute(&self, job: &Job, phase: &mut JobPhase) -> Result<usize, JobError> {
        self.enter(job, phase, JobPhase::Admitting);
        let workdir = self.job_dir(job).map_err(JobError::Unexpected)?;
        self.admit(job)?;

        self.enter(job, phase, JobPhase::Fetching);
        let mut artifact = self.fetch(job, workdir.path()).await?;

        if job.kind == JobKind::Audio {
            self.enter(job, phase, JobPhase::PostProcessing);
            artifact = self
                .collab
                .transcoder
                .transcode_audio(&artifact)
                .await
                .map_err(JobError::Transcode)?;
        }

        let duration_secs = match job.snapshot.duration_secs {
            0 => best_effort(
                "probe duration",
                self.collab.transcoder.probe_duration(&artifact).await,
            )
            .unwrap_or(0),
            d => d,
        };

        let thumb = if job.kind == JobKind::Video {
            self.enter(job, phase, JobPhase::ThumbnailPreparing);
            thumbnail::prepare(
                self.collab.fetcher.as_ref(),
                self.collab.transcoder.as_ref(),
                job.snapshot.thumbnail.as_deref(),
                &artifact,
                workdir.path(),
            )
            .await
        } else {
            None
        };

        let size = tokio::fs::metadata(&artifact)
            .await
            .with_context(|| format!("stat artifact {}", artifact.display()))
            .map_err(JobError::Unexpected)?
            .len();
        let file_name = format!(
            "{}.{}",
            sanitize_filename(&job.snapshot.title),
            job.kind.delivery_ext()
        );

        let parts = if size > self.settings.delivery_ceiling {
            self.enter(job, phase, JobPhase::Splitting);
            self.split(job, &artifact, workdir.path()).await?
        } else {
            vec![Part {
                index: 1,
                path: artifact.clone(),
                size_bytes: size,
            }]
        };

        self.enter(job, phase, JobPhase::Delivering);
        self.deliver(job, &parts, &file_name, duration_secs, thumb.as_deref(), size)
            .await?;
        Ok(parts.len())
    }

    fn enter(&self, job: &Job, phase: &mut JobPhase, next: JobPhase) {
        *phase = next;
        tracing::debug!(job_id = job.id, user_id = job.user_id, phase = %next, "entering phase");
    }

    fn admit(&self, job: &Job) -> Result<(), JobError> {
        let required = job.snapshot.approx_size(job.kind, &job.variant_id);
        let free = self
            .collab
            .disk
            .free_bytes()
            .context("query free disk space")
            .map_err(JobError::Unexpected)?;
        if !admit(required, free) {
            return Err(JobError::InsufficientStorage {
                needed: required.saturating_mul(2),
                available: free,
            });
        }
        Ok(())
    }

    fn job_dir(&self, job: &Job) -> anyhow::Result<tempfile::TempDir> {
        std::fs::create_dir_all(&self.settings.work_dir)
            .with_context(|| format!("create work dir {}", self.settings.work_dir.display()))?;
        tempfile::Builder::new()
            .prefix(&format!("vidq-job-{}-", job.id))
            .tempdir_in(&self.settings.work_dir)
            .context("create job temp dir")
    }

    async fn status(&self, job: &Job, text: &str) {
        best_effort(
            "render status",
            self.collab.host.render_status(&job.surface, text).await,
        );
    }

    async fn fetch(&self, job: &Job, dir: &Path) -> Result<PathBuf, JobError> {
        self.status(job, DOWNLOAD_STARTED).await;
        let request = FetchRequest {
            reference: job.snapshot.reference.clone(),
            format: job.snapshot.format_selector(job.kind, &job.variant_id),
            kind: job.kind,
            file_stem: sanitize_filename(&job.snapshot.title),
        };
        let progress = PhaseProgress::start(
            self.collab.host.clone(),
            job.surface,
            "Downloading",
            self.settings.progress_interval,
        );
        let path = match self.collab.fetcher.fetch(&request, dir, &progress).await {
            Ok(path) => path,
            Err(e) => {
                progress.finish(None).await;
                return Err(JobError::Fetch(e));
            }
        };
        if tokio::fs::metadata(&path).await.is_err() {
            progress.finish(None).await;
            return Err(JobError::Fetch(anyhow!(
                "fetcher reported {} but no file exists",
                path.display()
            )));
        }
        progress.finish(Some(DOWNLOAD_FINISHED)).await;
        tracing::info!(job_id = job.id, path = %path.display(), "fetch complete");
        Ok(path)
    }

    async fn split(&self, job: &Job, artifact: &Path, dir: &Path) -> Result<Vec<Part>, JobError> {
        self.status(job, SPLITTING).await;
        let source = artifact.to_path_buf();
        let out_dir = dir.to_path_buf();
        let ceiling = self.settings.delivery_ceiling;
        let policy = self.settings.split_policy;
        let parts =
            tokio::task::spawn_blocking(move || split_file(&source, &out_dir, ceiling, policy))
                .await
                .map_err(|e| JobError::Unexpected(anyhow!("split task failed: {}", e)))??;
        tracing::info!(job_id = job.id, parts = parts.len(), "artifact split");
        Ok(parts)
    }

    async fn deliver(
        &self,
        job: &Job,
        parts: &[Part],
        file_name: &str,
        duration_secs: u64,
        thumb: Option<&Path>,
        total: u64,
    ) -> Result<(), JobError> {
        let split = parts.len() > 1;
        self.status(job, if split { UPLOAD_STARTED_PARTS } else { UPLOAD_STARTED })
            .await;
        let quality = job.snapshot.quality_line(job.kind, &job.variant_id);
        let progress = PhaseProgress::start(
            self.collab.host.clone(),
            job.surface,
            "Uploading",
            self.settings.progress_interval,
        );

        let mut offset = 0u64;
        for part in parts {
            let name = if split {
                part.path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| file_name.to_string())
            } else {
                file_name.to_string()
            };
            let delivery = Delivery {
                chat_id: job.chat_id,
                kind: job.kind,
                path: part.path.clone(),
                caption: caption(&name, &quality, &job.snapshot.reference),
                duration_secs,
                thumbnail: thumb.map(Path::to_path_buf),
                part: split.then_some((part.index, parts.len())),
            };
            let sink = OffsetSink {
                inner: &progress,
                offset,
                total,
            };
            let delivered = match self.collab.host.deliver(&delivery, &sink).await {
                Ok(d) => d,
                Err(source) => {
                    progress.finish(None).await;
                    return Err(JobError::Delivery {
                        part: part.index,
                        source,
                    });
                }
            };
            offset += part.size_bytes;
            tracing::debug!(job_id = job.id, part = part.index, "part delivered");
            best_effort("mirror delivery", self.collab.host.mirror(&delivered).await);
        }
        progress.finish(None).await;
        Ok(())
    }
}
