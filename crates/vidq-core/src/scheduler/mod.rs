//! Per-user scheduling: one running job per user, FIFO backlog for the rest.
//!
//! Each user has its own async lock around [`UserState`]; the registry map
//! is only locked long enough to look up, insert or drop a user's slot. A
//! worker task owns a busy user and drains the backlog before it exits; an
//! idle user's slot is dropped so the map only holds users with work.

mod user_state;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::sync::watch;

use crate::collab::{MessagingHost, UserId};
use crate::error::JobError;
use crate::pipeline::{Job, JobReport};
use crate::selection::SelectionStore;

pub use user_state::UserState;

/// Executes jobs for the scheduler. Implemented by the pipeline; tests swap in fakes.
#[async_trait]
pub trait JobRunner: Send + Sync + 'static {
    /// Runs all phases of `job` and reports how it ended.
    async fn run(&self, job: Job) -> JobReport;
    /// Final user-visible effect of a run (clear or annotate the surface).
    async fn settle(&self, report: &JobReport);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    RunImmediately,
    /// 1-based backlog position.
    Enqueued(usize),
}

pub fn queued_text(position: usize) -> String {
    format!("Waiting for the current job to finish, your position: {position}")
}

type UserSlot = Arc<tokio::sync::Mutex<UserState>>;

pub struct Scheduler {
    runner: Arc<dyn JobRunner>,
    selections: Arc<SelectionStore>,
    host: Arc<dyn MessagingHost>,
    users: Mutex<HashMap<UserId, UserSlot>>,
    active: watch::Sender<usize>,
}

impl Scheduler {
    pub fn new(
        runner: Arc<dyn JobRunner>,
        selections: Arc<SelectionStore>,
        host: Arc<dyn MessagingHost>,
    ) -> Arc<Self> {
        let (active, _) = watch::channel(0);
        Arc::new(Self {
            runner,
            selections,
            host,
            users: Mutex::new(HashMap::new()),
            active,
        })
    }

    fn users(&self) -> MutexGuard<'_, HashMap<UserId, UserSlot>> {
        self.users.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn slot(&self, user_id: UserId) -> UserSlot {
        self.users().entry(user_id).or_default().clone()
    }

    fn existing(&self, user_id: UserId) -> Option<UserSlot> {
        self.users().get(&user_id).cloned()
    }

    /// Drops an idle user's slot unless a submission already holds it.
    fn release(&self, user_id: UserId, slot: &UserSlot) {
        let mut users = self.users();
        // Held only by the map and the caller.
        if Arc::strong_count(slot) == 2 {
            users.remove(&user_id);
        }
    }

    /// Starts `job` now if its user is idle, otherwise queues it behind the
    /// running job on a fresh status surface.
    pub async fn submit(self: &Arc<Self>, job: Job) -> Submission {
        let user_id = job.user_id;
        let slot = self.slot(user_id);
        let mut state = slot.lock().await;

        if state.try_claim() {
            self.active.send_modify(|n| *n += 1);
            drop(state);
            tracing::info!(job_id = job.id, user_id, "job starting");
            tokio::spawn(self.clone().work(user_id, job));
            return Submission::RunImmediately;
        }

        let expected = state.backlog_len() + 1;
        let job = match self.host.reply(job.chat_id, &queued_text(expected)).await {
            Ok(surface) => job.with_surface(surface),
            Err(e) => {
                tracing::warn!(job_id = job.id, "open queued status failed (ignored): {:#}", e);
                job
            }
        };
        let job_id = job.id;
        let position = state.enqueue(job);
        tracing::info!(job_id, user_id, position, "job queued");
        Submission::Enqueued(position)
    }

    /// True while a job for `user_id` is running.
    pub async fn is_busy(&self, user_id: UserId) -> bool {
        match self.existing(user_id) {
            Some(slot) => slot.lock().await.is_busy(),
            None => false,
        }
    }

    pub async fn backlog_len(&self, user_id: UserId) -> usize {
        match self.existing(user_id) {
            Some(slot) => slot.lock().await.backlog_len(),
            None => 0,
        }
    }

    /// Users with a running job or a backlog.
    pub fn tracked_users(&self) -> usize {
        self.users().len()
    }

    /// Resolves once no user has a running worker.
    pub async fn wait_idle(&self) {
        let mut rx = self.active.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    /// Worker loop for a claimed user: run, advance, settle, repeat.
    async fn work(self: Arc<Self>, user_id: UserId, first: Job) {
        let mut job = first;
        loop {
            let report = self.run_contained(job).await;
            let next = self.complete(user_id).await;
            self.runner.settle(&report).await;
            match next {
                Some(j) => {
                    tracing::info!(job_id = j.id, user_id, "starting next queued job");
                    job = j;
                }
                None => break,
            }
        }
        self.active.send_modify(|n| *n = n.saturating_sub(1));
    }

    /// Runs the job on its own task so a panic only fails this job.
    async fn run_contained(&self, job: Job) -> JobReport {
        let runner = self.runner.clone();
        let fallback = job.clone();
        match tokio::spawn(async move { runner.run(job).await }).await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(job_id = fallback.id, user_id = fallback.user_id, "job task died: {}", e);
                JobReport::failed(
                    &fallback,
                    None,
                    JobError::Unexpected(anyhow!("job task died: {}", e)),
                )
            }
        }
    }

    /// Called after every run: hands back the backlog head, or marks the user
    /// idle and drops their already-selected menu entry.
    async fn complete(&self, user_id: UserId) -> Option<Job> {
        let slot = self.slot(user_id);
        let mut state = slot.lock().await;
        let next = state.advance();
        if next.is_none() {
            self.selections.discard_selected(user_id);
            self.release(user_id, &slot);
            tracing::debug!(user_id, "user idle");
        }
        next
    }
}
