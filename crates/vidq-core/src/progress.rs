//! Progress coalescing for status surfaces (percent, ETA, rate limiting).
//!
//! Collaborators report every chunk; a status surface should only be edited
//! once per interval. The coalescer decides which samples become edits and
//! computes percent/ETA for them.

use std::time::{Duration, Instant};

/// One raw progress report from a fetch or upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSample {
    /// Bytes transferred so far.
    pub current: u64,
    /// Total bytes, if known.
    pub total: Option<u64>,
    /// Collaborator-supplied ETA in seconds, preferred over the computed one.
    pub eta_hint: Option<u64>,
}

impl ProgressSample {
    pub fn new(current: u64, total: Option<u64>) -> Self {
        Self {
            current,
            total,
            eta_hint: None,
        }
    }
}

/// An update that should be rendered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressUpdate {
    pub percent: f64,
    pub eta_secs: u64,
}

impl ProgressUpdate {
    /// `"<label>: 42.00% - ETA 13 s"`.
    pub fn render(&self, label: &str) -> String {
        format!("{}: {:.2}% - ETA {} s", label, self.percent, self.eta_secs)
    }
}

/// Percent complete; 0 when the total is unknown or zero.
pub fn percent(current: u64, total: Option<u64>) -> f64 {
    match total {
        Some(t) if t > 0 => current as f64 * 100.0 / t as f64,
        _ => 0.0,
    }
}

/// `elapsed * (total - current) / current`, or 0 before the first byte.
pub fn eta_secs(elapsed: Duration, current: u64, total: Option<u64>) -> u64 {
    let Some(total) = total else {
        return 0;
    };
    if current == 0 {
        return 0;
    }
    let remaining = total.saturating_sub(current);
    (elapsed.as_secs_f64() * remaining as f64 / current as f64) as u64
}

/// Rate-limits samples to at most one update per `interval`.
///
/// The interval starts when the coalescer is created, so the first update
/// appears one interval into the phase. `finish` returns true exactly once.
#[derive(Debug, Clone)]
pub struct ProgressCoalescer {
    interval: Duration,
    started: Instant,
    last_emit: Instant,
    finished: bool,
}

impl ProgressCoalescer {
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            started: now,
            last_emit: now,
            finished: false,
        }
    }

    /// Returns an update when at least `interval` has passed since the last one.
    pub fn offer(&mut self, sample: ProgressSample, now: Instant) -> Option<ProgressUpdate> {
        if self.finished || now.saturating_duration_since(self.last_emit) < self.interval {
            return None;
        }
        self.last_emit = now;
        let elapsed = now.saturating_duration_since(self.started);
        Some(ProgressUpdate {
            percent: percent(sample.current, sample.total),
            eta_secs: sample
                .eta_hint
                .unwrap_or_else(|| eta_secs(elapsed, sample.current, sample.total)),
        })
    }

    /// Marks the phase complete. True on the first call only.
    pub fn finish(&mut self) -> bool {
        !std::mem::replace(&mut self.finished, true)
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}
