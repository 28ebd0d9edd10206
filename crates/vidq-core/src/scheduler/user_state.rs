//! Busy flag and FIFO backlog of one user.

use std::collections::VecDeque;

use crate::pipeline::Job;

/// `busy` is true exactly while a worker owns this user.
#[derive(Debug, Default)]
pub struct UserState {
    busy: bool,
    backlog: VecDeque<Job>,
}

impl UserState {
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    /// Marks the user busy. False if a job is already running.
    pub fn try_claim(&mut self) -> bool {
        if self.busy {
            return false;
        }
        self.busy = true;
        true
    }

    /// Appends to the backlog; returns the 1-based position.
    pub fn enqueue(&mut self, job: Job) -> usize {
        self.backlog.push_back(job);
        self.backlog.len()
    }

    /// Pops the next job (staying busy) or goes idle when the backlog is empty.
    pub fn advance(&mut self) -> Option<Job> {
        let next = self.backlog.pop_front();
        if next.is_none() {
            self.busy = false;
        }
        next
    }
}
