//! Front door: turns inbound messages and menu presses into selection,
//! search and scheduling calls.

mod callback;

use std::sync::Arc;

use crate::collab::{
    ChatId, Choice, DiskStat, Fetcher, MediaResolver, MessagingHost, SearchProvider, Surface,
    Transcoder, UserId,
};
use crate::config::{FormatConfig, VidqConfig};
use crate::error::{best_effort, SelectionError};
use crate::media::{best_audio_label, build_catalog};
use crate::pipeline::{Collaborators, JobPipeline, PipelineSettings};
use crate::scheduler::{Scheduler, Submission};
use crate::selection::{EntryTicket, SelectionStore};

pub use callback::CallbackAction;

pub const GREETING: &str = "Hi! Send me a link to download it, or any text to search for videos.";
pub const NOT_ALLOWED: &str = "You are not allowed to use this bot.";
pub const RESOLVING: &str = "Fetching media information...";
pub const RESOLVE_FAILED: &str = "Could not read media information for this link.";
pub const CHOOSE_QUALITY: &str = "Please choose the quality you want to download:";
pub const SEARCHING: &str = "Searching...";
pub const SEARCH_FAILED: &str = "Search failed, please try again later.";
pub const NO_RESULTS: &str = "No results found.";
pub const JOB_STARTED: &str = "Your job has started.";
pub const INVALID_SELECTION: &str = "Invalid selection.";

const SEARCH_TITLE_MAX: usize = 40;

/// Who sent an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub user_id: UserId,
    pub chat_id: ChatId,
    pub handle: Option<String>,
    pub name: String,
}

impl Sender {
    /// `@handle` when known, the display name otherwise.
    pub fn mention(&self) -> String {
        match &self.handle {
            Some(h) if !h.is_empty() => format!("@{h}"),
            _ => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Text {
        from: Sender,
        text: String,
    },
    Callback {
        from: Sender,
        callback_id: String,
        /// Message the pressed menu is attached to.
        surface: Surface,
        data: String,
    },
}

/// Process-backed (or fake) services the agent wires together.
#[derive(Clone)]
pub struct Services {
    pub resolver: Arc<dyn MediaResolver>,
    pub fetcher: Arc<dyn Fetcher>,
    pub transcoder: Arc<dyn Transcoder>,
    pub search: Arc<dyn SearchProvider>,
    pub disk: Arc<dyn DiskStat>,
}

#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub allowed_users: Vec<UserId>,
    pub formats: FormatConfig,
    pub max_search_results: u32,
}

impl AgentSettings {
    pub fn from_config(cfg: &VidqConfig) -> Self {
        Self {
            allowed_users: cfg.allowed_users.clone(),
            formats: cfg.formats(),
            max_search_results: cfg.search().max_results,
        }
    }

    /// Empty list allows everyone.
    pub fn is_allowed(&self, user_id: UserId) -> bool {
        self.allowed_users.is_empty() || self.allowed_users.contains(&user_id)
    }
}

pub struct Agent {
    settings: AgentSettings,
    resolver: Arc<dyn MediaResolver>,
    search: Arc<dyn SearchProvider>,
    host: Arc<dyn MessagingHost>,
    selections: Arc<SelectionStore>,
    scheduler: Arc<Scheduler>,
}

impl Agent {
    /// Builds the selection store, pipeline and scheduler around `host`.
    /// Must be called inside a tokio runtime.
    pub fn assemble(cfg: &VidqConfig, host: Arc<dyn MessagingHost>, services: Services) -> Self {
        let selections = SelectionStore::new(host.clone(), cfg.selection_timeout());
        let pipeline = JobPipeline::new(
            Collaborators {
                fetcher: services.fetcher,
                transcoder: services.transcoder,
                host: host.clone(),
                disk: services.disk,
            },
            PipelineSettings::from_config(cfg),
        );
        let scheduler = Scheduler::new(Arc::new(pipeline), selections.clone(), host.clone());
        Self {
            settings: AgentSettings::from_config(cfg),
            resolver: services.resolver,
            search: services.search,
            host,
            selections,
            scheduler,
        }
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    pub fn selections(&self) -> &Arc<SelectionStore> {
        &self.selections
    }

    pub async fn handle(&self, inbound: Inbound) {
        match inbound {
            Inbound::Text { from, text } => self.on_text(&from, &text).await,
            Inbound::Callback {
                from,
                callback_id,
                surface,
                data,
            } => self.on_callback(&from, &callback_id, surface, &data).await,
        }
    }

    async fn reply(&self, chat_id: ChatId, text: &str) -> Option<Surface> {
        best_effort("reply", self.host.reply(chat_id, text).await)
    }

    async fn on_text(&self, from: &Sender, text: &str) {
        let text = text.trim();
        if !self.settings.is_allowed(from.user_id) {
            tracing::info!(user_id = from.user_id, "refused message from user not on the allow list");
            self.reply(from.chat_id, NOT_ALLOWED).await;
            return;
        }
        if text == "/start" {
            self.reply(from.chat_id, GREETING).await;
            return;
        }
        if text.contains("http://") || text.contains("https://") {
            self.note_reference(from, text).await;
            if let Some(surface) = self.reply(from.chat_id, RESOLVING).await {
                self.open_reference(from, text, surface).await;
            }
            return;
        }
        self.search(from, text).await;
    }

    async fn note_reference(&self, from: &Sender, reference: &str) {
        let note = audit_note(reference, from);
        best_effort("audit note", self.host.audit(&note).await);
    }

    async fn search(&self, from: &Sender, query: &str) {
        let Some(surface) = self.reply(from.chat_id, SEARCHING).await else {
            return;
        };
        let hits = match self.search.search(query, self.settings.max_search_results).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(user_id = from.user_id, "search failed: {:#}", e);
                best_effort("render status", self.host.render_status(&surface, SEARCH_FAILED).await);
                return;
            }
        };
        if hits.is_empty() {
            best_effort("render status", self.host.render_status(&surface, NO_RESULTS).await);
            return;
        }
        let choices: Vec<Choice> = hits
            .iter()
            .map(|hit| {
                Choice::new(
                    truncate_title(&hit.title),
                    CallbackAction::Search {
                        url: hit.url.clone(),
                    }
                    .encode(),
                )
            })
            .collect();
        let prompt = format!("Search results for: {query}");
        best_effort(
            "present search results",
            self.host.present_choices(&surface, &prompt, &choices).await,
        );
    }

    /// Opens a selection entry on `surface`, resolves `reference` and shows the quality menu.
    async fn open_reference(&self, from: &Sender, reference: &str, surface: Surface) {
        let ticket = self.selections.open(from.user_id, reference, surface);
        let resolved = match self.resolver.resolve(reference).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(user_id = from.user_id, reference, "resolve failed: {:#}", e);
                self.selections.discard(&ticket);
                best_effort("render status", self.host.render_status(&surface, RESOLVE_FAILED).await);
                return;
            }
        };
        let catalog = build_catalog(&resolved.formats, &self.settings.formats);
        let snapshot = match self.selections.record_variants(&ticket, &resolved, catalog) {
            Ok(s) => s,
            Err(SelectionError::NotFound) => {
                tracing::debug!(user_id = from.user_id, "reference superseded while resolving");
                return;
            }
            Err(e) => {
                best_effort("render status", self.host.render_status(&surface, e.user_message()).await);
                return;
            }
        };

        let mut choices: Vec<Choice> = snapshot
            .variants
            .iter()
            .map(|v| Choice::new(v.description.clone(), CallbackAction::video(&v.id).encode()))
            .collect();
        choices.push(Choice::new(
            best_audio_label(snapshot.best_audio.as_ref()),
            CallbackAction::best_audio().encode(),
        ));
        self.present_menu(&ticket, &choices).await;
    }

    async fn present_menu(&self, ticket: &EntryTicket, choices: &[Choice]) {
        best_effort(
            "present quality menu",
            self.host
                .present_choices(&ticket.surface, CHOOSE_QUALITY, choices)
                .await,
        );
    }

    async fn on_callback(&self, from: &Sender, callback_id: &str, surface: Surface, data: &str) {
        if !self.settings.is_allowed(from.user_id) {
            best_effort("answer callback", self.host.answer(callback_id, Some(NOT_ALLOWED)).await);
            return;
        }
        let Some(action) = CallbackAction::parse(data) else {
            best_effort(
                "answer callback",
                self.host.answer(callback_id, Some(INVALID_SELECTION)).await,
            );
            return;
        };
        match action {
            CallbackAction::Ignore => {
                best_effort("answer callback", self.host.answer(callback_id, None).await);
            }
            CallbackAction::Search { url } => {
                best_effort("answer callback", self.host.answer(callback_id, None).await);
                self.note_reference(from, &url).await;
                best_effort("clear search results", self.host.clear_choices(&surface).await);
                best_effort("render status", self.host.render_status(&surface, RESOLVING).await);
                self.open_reference(from, &url, surface).await;
            }
            CallbackAction::Select { kind, variant_id } => {
                let job = match self.selections.select(from.user_id, &surface, kind, &variant_id) {
                    Ok(job) => job,
                    Err(e) => {
                        tracing::debug!(user_id = from.user_id, "selection rejected: {}", e);
                        best_effort(
                            "answer callback",
                            self.host.answer(callback_id, Some(e.user_message())).await,
                        );
                        return;
                    }
                };
                best_effort("clear quality menu", self.host.clear_choices(&surface).await);
                let answer = match self.scheduler.submit(job).await {
                    Submission::RunImmediately => JOB_STARTED.to_string(),
                    Submission::Enqueued(position) => {
                        format!("Your job is queued at position {position}.")
                    }
                };
                best_effort("answer callback", self.host.answer(callback_id, Some(&answer)).await);
            }
        }
    }
}

/// `"<text>\n<@handle | name> (ID: <id>)"`.
pub fn audit_note(text: &str, from: &Sender) -> String {
    format!("{}\n{} (ID: {})", text, from.mention(), from.user_id)
}

/// Cuts titles longer than 40 characters and marks the cut with `...`.
pub fn truncate_title(title: &str) -> String {
    if title.chars().count() > SEARCH_TITLE_MAX {
        let cut: String = title.chars().take(SEARCH_TITLE_MAX).collect();
        format!("{cut}...")
    } else {
        title.to_string()
    }
}
