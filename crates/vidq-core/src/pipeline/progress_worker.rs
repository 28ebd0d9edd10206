//! Background renderer that turns coalesced progress into status edits.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::collab::{MessagingHost, ProgressSink, Surface};
use crate::error::best_effort;
use crate::progress::{ProgressCoalescer, ProgressSample};

/// Progress channel for one phase of one job.
///
/// Samples are coalesced on the caller's thread; only the latest rendered text
/// is handed to a renderer task, so a slow host never backs up the transfer.
/// [`PhaseProgress::finish`] waits for the renderer before writing the
/// completion text, which keeps edits on the surface in order.
pub(super) struct PhaseProgress {
    label: &'static str,
    coalescer: Mutex<ProgressCoalescer>,
    tx: watch::Sender<Option<String>>,
    renderer: JoinHandle<()>,
    host: Arc<dyn MessagingHost>,
    surface: Surface,
}

impl PhaseProgress {
    pub(super) fn start(
        host: Arc<dyn MessagingHost>,
        surface: Surface,
        label: &'static str,
        interval: Duration,
    ) -> Self {
        let (tx, rx) = watch::channel(None);
        let renderer = tokio::spawn(run_renderer(rx, host.clone(), surface));
        let now = tokio::time::Instant::now().into_std();
        Self {
            label,
            coalescer: Mutex::new(ProgressCoalescer::new(interval, now)),
            tx,
            renderer,
            host,
            surface,
        }
    }

    /// Closes the channel and, if given, renders `final_text` exactly once.
    pub(super) async fn finish(self, final_text: Option<&str>) {
        let first = self
            .coalescer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .finish();
        drop(self.tx);
        if self.renderer.await.is_err() {
            tracing::warn!("progress renderer task failed");
        }
        if let (true, Some(text)) = (first, final_text) {
            best_effort(
                "render phase completion",
                self.host.render_status(&self.surface, text).await,
            );
        }
    }
}

impl ProgressSink for PhaseProgress {
    fn report(&self, sample: ProgressSample) {
        let now = tokio::time::Instant::now().into_std();
        let update = self
            .coalescer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .offer(sample, now);
        if let Some(update) = update {
            self.tx.send_replace(Some(update.render(self.label)));
        }
    }
}

async fn run_renderer(
    mut rx: watch::Receiver<Option<String>>,
    host: Arc<dyn MessagingHost>,
    surface: Surface,
) {
    while rx.changed().await.is_ok() {
        let text = rx.borrow_and_update().clone();
        if let Some(text) = text {
            best_effort("render progress", host.render_status(&surface, &text).await);
        }
    }
}

/// Maps per-part samples onto the byte range of the whole artifact so all
/// parts share one upload progress channel.
pub(super) struct OffsetSink<'a> {
    pub(super) inner: &'a dyn ProgressSink,
    pub(super) offset: u64,
    pub(super) total: u64,
}

impl ProgressSink for OffsetSink<'_> {
    fn report(&self, sample: ProgressSample) {
        self.inner.report(ProgressSample {
            current: self.offset.saturating_add(sample.current),
            total: Some(self.total),
            eta_hint: None,
        });
    }
}
