//! Selection store with per-entry expiry timers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::task::AbortHandle;

use crate::collab::{MessagingHost, Surface, UserId};
use crate::error::{best_effort, SelectionError};
use crate::media::{Catalog, JobKind, MediaSnapshot, ResolvedMedia};
use crate::pipeline::Job;

/// Rendered on the menu when nobody picks a quality in time.
pub const CANCELLED_TEXT: &str = "No quality was chosen, the request was cancelled.";

/// Identity of one opened entry. A newer `open` for the same user invalidates older tickets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryTicket {
    pub user_id: UserId,
    pub surface: Surface,
    token: u64,
}

struct SelectionEntry {
    token: u64,
    surface: Surface,
    media: MediaSnapshot,
    selected: bool,
    timer: Option<AbortHandle>,
}

impl SelectionEntry {
    fn stop_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

/// Holds at most one entry per user. Entries are replaced wholesale, never merged.
pub struct SelectionStore {
    host: Arc<dyn MessagingHost>,
    timeout: Duration,
    state: Mutex<StoreState>,
}

#[derive(Default)]
struct StoreState {
    next_token: u64,
    entries: HashMap<UserId, SelectionEntry>,
}

impl SelectionStore {
    pub fn new(host: Arc<dyn MessagingHost>, timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            host,
            timeout,
            state: Mutex::new(StoreState::default()),
        })
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Opens a new entry for `user_id`, superseding any previous one, and arms its timer.
    /// Must be called inside a tokio runtime.
    pub fn open(self: &Arc<Self>, user_id: UserId, reference: &str, surface: Surface) -> EntryTicket {
        let mut state = self.state();
        state.next_token += 1;
        let token = state.next_token;

        let store: Weak<Self> = Arc::downgrade(self);
        let timeout = self.timeout;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(store) = store.upgrade() {
                store.expire(user_id, token).await;
            }
        })
        .abort_handle();

        let entry = SelectionEntry {
            token,
            surface,
            media: MediaSnapshot::new(reference),
            selected: false,
            timer: Some(timer),
        };
        if let Some(mut old) = state.entries.insert(user_id, entry) {
            old.stop_timer();
            tracing::debug!(user_id, old_token = old.token, "superseded selection entry");
        }
        EntryTicket {
            user_id,
            surface,
            token,
        }
    }

    /// Fills in metadata and variants for an opened entry and returns a copy for the menu.
    ///
    /// An empty catalog discards the entry (`NoUsableVariant`); a superseded
    /// or expired ticket yields `NotFound`.
    pub fn record_variants(
        &self,
        ticket: &EntryTicket,
        resolved: &ResolvedMedia,
        catalog: Catalog,
    ) -> Result<MediaSnapshot, SelectionError> {
        let mut state = self.state();
        let current = state
            .entries
            .get(&ticket.user_id)
            .is_some_and(|e| e.token == ticket.token);
        if !current {
            return Err(SelectionError::NotFound);
        }
        if catalog.variants.is_empty() {
            if let Some(mut entry) = state.entries.remove(&ticket.user_id) {
                entry.stop_timer();
            }
            return Err(SelectionError::NoUsableVariant);
        }
        let entry = state
            .entries
            .get_mut(&ticket.user_id)
            .ok_or(SelectionError::NotFound)?;
        entry.media.title = resolved.title.clone();
        entry.media.duration_secs = resolved.duration_secs;
        entry.media.thumbnail = resolved.thumbnail.clone();
        entry.media.variants = catalog.variants;
        entry.media.best_audio = catalog.best_audio;
        Ok(entry.media.clone())
    }

    /// Accepts a menu choice made on `surface`. The entry stays (marked selected)
    /// so a second press reports `AlreadySelected`; the returned job owns a deep copy.
    pub fn select(
        &self,
        user_id: UserId,
        surface: &Surface,
        kind: JobKind,
        variant_id: &str,
    ) -> Result<Job, SelectionError> {
        let mut state = self.state();
        let entry = state
            .entries
            .get_mut(&user_id)
            .filter(|e| e.surface == *surface)
            .ok_or(SelectionError::NotFound)?;
        if entry.selected {
            return Err(SelectionError::AlreadySelected);
        }
        if !entry.media.offers(kind, variant_id) {
            return Err(SelectionError::UnknownVariant(variant_id.to_string()));
        }
        entry.selected = true;
        entry.stop_timer();
        Ok(Job::new(
            user_id,
            kind,
            variant_id,
            entry.media.clone(),
            entry.surface,
        ))
    }

    /// Drops the entry behind `ticket` if it is still current.
    pub fn discard(&self, ticket: &EntryTicket) {
        let mut state = self.state();
        if state
            .entries
            .get(&ticket.user_id)
            .is_some_and(|e| e.token == ticket.token)
        {
            if let Some(mut entry) = state.entries.remove(&ticket.user_id) {
                entry.stop_timer();
            }
        }
    }

    /// Drops the user's entry only if it was already selected. Pending menus survive.
    pub fn discard_selected(&self, user_id: UserId) {
        let mut state = self.state();
        if state.entries.get(&user_id).is_some_and(|e| e.selected) {
            state.entries.remove(&user_id);
        }
    }

    /// True if the user has an unselected entry.
    pub fn is_pending(&self, user_id: UserId) -> bool {
        self.state()
            .entries
            .get(&user_id)
            .is_some_and(|e| !e.selected)
    }

    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn expire(&self, user_id: UserId, token: u64) {
        let expired = {
            let mut state = self.state();
            let due = state
                .entries
                .get(&user_id)
                .is_some_and(|e| e.token == token && !e.selected);
            if due {
                state.entries.remove(&user_id)
            } else {
                None
            }
        };
        let Some(entry) = expired else {
            return;
        };
        tracing::info!(user_id, token, "selection timed out");
        best_effort(
            "render selection timeout",
            self.host.render_status(&entry.surface, CANCELLED_TEXT).await,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{Choice, DeliveredRef, Delivery, ProgressSink};
    use crate::media::{BestAudio, VariantOption};
    use anyhow::Result;
    use async_trait::async_trait;

    #[derive(Default)]
    struct RecordingHost {
        renders: Mutex<Vec<(Surface, String)>>,
    }

    #[async_trait]
    impl MessagingHost for RecordingHost {
        async fn reply(&self, chat_id: i64, _text: &str) -> Result<Surface> {
            Ok(Surface {
                chat_id,
                message_id: 1,
            })
        }
        async fn present_choices(&self, _s: &Surface, _p: &str, _c: &[Choice]) -> Result<()> {
            Ok(())
        }
        async fn render_status(&self, surface: &Surface, text: &str) -> Result<()> {
            self.renders.lock().unwrap().push((*surface, text.to_string()));
            Ok(())
        }
        async fn clear_choices(&self, _s: &Surface) -> Result<()> {
            Ok(())
        }
        async fn remove_status(&self, _s: &Surface) -> Result<()> {
            Ok(())
        }
        async fn answer(&self, _id: &str, _t: Option<&str>) -> Result<()> {
            Ok(())
        }
        async fn deliver(&self, _d: &Delivery, _s: &dyn ProgressSink) -> Result<DeliveredRef> {
            anyhow::bail!("not used")
        }
        async fn mirror(&self, _d: &DeliveredRef) -> Result<()> {
            Ok(())
        }
        async fn audit(&self, _t: &str) -> Result<()> {
            Ok(())
        }
    }

    fn surface(id: i64) -> Surface {
        Surface {
            chat_id: 10,
            message_id: id,
        }
    }

    fn catalog() -> Catalog {
        Catalog {
            variants: vec![
                VariantOption {
                    id: "18".into(),
                    has_audio: true,
                    description: "360p".into(),
                    approx_size: Some(100),
                },
                VariantOption {
                    id: "22".into(),
                    has_audio: true,
                    description: "720p".into(),
                    approx_size: None,
                },
            ],
            best_audio: Some(BestAudio {
                format_id: "140".into(),
                ext: "m4a".into(),
                approx_size: None,
            }),
        }
    }

    fn resolved(title: &str) -> ResolvedMedia {
        ResolvedMedia {
            title: title.into(),
            duration_secs: 30,
            ..ResolvedMedia::default()
        }
    }

    fn store_with_host() -> (Arc<SelectionStore>, Arc<RecordingHost>) {
        let host = Arc::new(RecordingHost::default());
        let store = SelectionStore::new(host.clone(), Duration::from_secs(60));
        (store, host)
    }

    #[tokio::test(start_paused = true)]
    async fn select_twice_reports_already_selected() {
        let (store, _host) = store_with_host();
        let ticket = store.open(1, "https://e.com/a", surface(5));
        store.record_variants(&ticket, &resolved("A"), catalog()).unwrap();

        let job = store.select(1, &surface(5), JobKind::Video, "18").unwrap();
        assert_eq!(job.variant_id, "18");
        assert_eq!(job.snapshot.title, "A");
        assert_eq!(
            store.select(1, &surface(5), JobKind::Video, "22").unwrap_err(),
            SelectionError::AlreadySelected
        );
        assert_eq!(
            store.select(1, &surface(5), JobKind::Audio, "bestaudio").unwrap_err(),
            SelectionError::AlreadySelected
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_variant_is_rejected_without_consuming_entry() {
        let (store, _host) = store_with_host();
        let ticket = store.open(1, "https://e.com/a", surface(5));
        store.record_variants(&ticket, &resolved("A"), catalog()).unwrap();
        assert_eq!(
            store.select(1, &surface(5), JobKind::Video, "999").unwrap_err(),
            SelectionError::UnknownVariant("999".into())
        );
        assert!(store.is_pending(1));
        assert!(store.select(1, &surface(5), JobKind::Audio, "bestaudio").is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn best_audio_selectable_without_audio_only_format() {
        let (store, _host) = store_with_host();
        let ticket = store.open(1, "https://e.com/a", surface(5));
        let catalog = Catalog {
            best_audio: None,
            ..catalog()
        };
        store.record_variants(&ticket, &resolved("A"), catalog).unwrap();

        assert_eq!(
            store.select(1, &surface(5), JobKind::Audio, "140").unwrap_err(),
            SelectionError::UnknownVariant("140".into())
        );
        let job = store.select(1, &surface(5), JobKind::Audio, "bestaudio").unwrap();
        assert_eq!(job.kind, JobKind::Audio);
        assert_eq!(job.snapshot.approx_size(JobKind::Audio, "bestaudio"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_catalog_discards_entry() {
        let (store, host) = store_with_host();
        let ticket = store.open(1, "https://e.com/a", surface(5));
        let err = store
            .record_variants(&ticket, &resolved("A"), Catalog::default())
            .unwrap_err();
        assert_eq!(err, SelectionError::NoUsableVariant);
        assert!(store.is_empty());
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(host.renders.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unselected_entry_expires_once() {
        let (store, host) = store_with_host();
        let ticket = store.open(1, "https://e.com/a", surface(5));
        store.record_variants(&ticket, &resolved("A"), catalog()).unwrap();

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert!(store.is_pending(1));
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!store.is_pending(1));

        let renders = host.renders.lock().unwrap().clone();
        assert_eq!(renders, vec![(surface(5), CANCELLED_TEXT.to_string())]);
        assert_eq!(
            store.select(1, &surface(5), JobKind::Video, "18").unwrap_err(),
            SelectionError::NotFound
        );
    }

    #[tokio::test(start_paused = true)]
    async fn selected_entry_never_expires() {
        let (store, host) = store_with_host();
        let ticket = store.open(1, "https://e.com/a", surface(5));
        store.record_variants(&ticket, &resolved("A"), catalog()).unwrap();
        store.select(1, &surface(5), JobKind::Video, "22").unwrap();
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(host.renders.lock().unwrap().is_empty());
        assert_eq!(store.len(), 1);
        store.discard_selected(1);
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn superseding_cancels_old_timer_and_old_menu() {
        let (store, host) = store_with_host();
        let first = store.open(1, "https://e.com/a", surface(5));
        store.record_variants(&first, &resolved("A"), catalog()).unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;

        let second = store.open(1, "https://e.com/b", surface(6));
        assert_eq!(
            store.record_variants(&first, &resolved("A"), catalog()).unwrap_err(),
            SelectionError::NotFound
        );
        store.record_variants(&second, &resolved("B"), catalog()).unwrap();
        assert_eq!(
            store.select(1, &surface(5), JobKind::Video, "18").unwrap_err(),
            SelectionError::NotFound
        );

        // Old deadline passes without a render; the new one fires at t=90.
        tokio::time::sleep(Duration::from_secs(40)).await;
        assert!(host.renders.lock().unwrap().is_empty());
        tokio::time::sleep(Duration::from_secs(21)).await;
        assert_eq!(host.renders.lock().unwrap().len(), 1);
        assert_eq!(host.renders.lock().unwrap()[0].0, surface(6));
    }

    #[tokio::test(start_paused = true)]
    async fn job_snapshot_is_independent_of_later_entries() {
        let (store, _host) = store_with_host();
        let ticket = store.open(1, "https://e.com/a", surface(5));
        store.record_variants(&ticket, &resolved("A"), catalog()).unwrap();
        let job = store.select(1, &surface(5), JobKind::Video, "18").unwrap();

        let ticket = store.open(1, "https://e.com/b", surface(6));
        store
            .record_variants(&ticket, &resolved("B"), Catalog {
                variants: vec![VariantOption {
                    id: "99".into(),
                    has_audio: true,
                    description: "4K".into(),
                    approx_size: None,
                }],
                best_audio: None,
            })
            .unwrap();

        assert_eq!(job.snapshot.reference, "https://e.com/a");
        assert_eq!(job.snapshot.title, "A");
        assert_eq!(job.snapshot.variants.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn discarded_ticket_stops_timer() {
        let (store, host) = store_with_host();
        let ticket = store.open(1, "https://e.com/a", surface(5));
        store.discard(&ticket);
        assert!(store.is_empty());
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(host.renders.lock().unwrap().is_empty());
    }
}
