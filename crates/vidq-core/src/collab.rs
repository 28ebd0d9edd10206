//! Collaborator interfaces the core orchestrates.
//!
//! The scheduler and pipeline only depend on these traits; the process-backed
//! implementations live in `adapters` and a front end supplies the messaging host.

use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::media::{JobKind, ResolvedMedia};
use crate::progress::ProgressSample;

pub type UserId = i64;
pub type ChatId = i64;

/// A host message that can be edited in place (progress, errors, menus).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Surface {
    pub chat_id: ChatId,
    pub message_id: i64,
}

/// One button of a choice menu; `data` comes back verbatim in the callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub label: String,
    pub data: String,
}

impl Choice {
    pub fn new(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data: data.into(),
        }
    }
}

/// Identifies a delivered item so it can be mirrored to the audit channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredRef {
    pub chat_id: ChatId,
    pub message_id: i64,
}

/// One file handed to the messaging host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub chat_id: ChatId,
    pub kind: JobKind,
    pub path: PathBuf,
    pub caption: String,
    pub duration_secs: u64,
    pub thumbnail: Option<PathBuf>,
    /// `(index, count)` when the artifact was split.
    pub part: Option<(usize, usize)>,
}

/// What to fetch and how to name it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub reference: String,
    /// Format selector, e.g. `137+bestaudio` or `bestaudio`.
    pub format: String,
    pub kind: JobKind,
    /// Sanitized file stem; the fetcher picks the extension.
    pub file_stem: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
}

/// Receives transfer progress. Called from the transfer's own task or thread.
pub trait ProgressSink: Send + Sync {
    fn report(&self, sample: ProgressSample);
}

/// Sink that drops every sample.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn report(&self, _sample: ProgressSample) {}
}

#[async_trait]
pub trait MediaResolver: Send + Sync {
    async fn resolve(&self, reference: &str) -> Result<ResolvedMedia>;
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Downloads `request` into `dest_dir` and returns the produced file.
    async fn fetch(
        &self,
        request: &FetchRequest,
        dest_dir: &Path,
        sink: &dyn ProgressSink,
    ) -> Result<PathBuf>;

    /// Downloads a small image (thumbnail) to `dest`.
    async fn fetch_image(&self, url: &str, dest: &Path) -> Result<()>;
}

#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn probe_duration(&self, media: &Path) -> Result<u64>;
    /// Writes a still frame taken `offset_secs` into `media` to `dest` (JPEG).
    async fn extract_thumbnail(&self, media: &Path, offset_secs: u64, dest: &Path) -> Result<()>;
    /// Rewrites the image at `path` in place as a 24-bit RGB JPEG.
    async fn normalize_image(&self, path: &Path) -> Result<()>;
    /// Converts `media` to MP3 at the best quality setting and returns the new file.
    async fn transcode_audio(&self, media: &Path) -> Result<PathBuf>;
}

#[async_trait]
pub trait MessagingHost: Send + Sync {
    /// Sends a plain message and returns it as a surface.
    async fn reply(&self, chat_id: ChatId, text: &str) -> Result<Surface>;
    /// Replaces the text of `surface` and attaches a menu.
    async fn present_choices(&self, surface: &Surface, prompt: &str, choices: &[Choice]) -> Result<()>;
    /// Replaces the text of `surface` and drops any menu. Must tolerate a deleted surface.
    async fn render_status(&self, surface: &Surface, text: &str) -> Result<()>;
    /// Removes the menu attached to `surface`, keeping its text.
    async fn clear_choices(&self, surface: &Surface) -> Result<()>;
    /// Deletes `surface`.
    async fn remove_status(&self, surface: &Surface) -> Result<()>;
    /// Acknowledges a menu press, optionally with a short toast.
    async fn answer(&self, callback_id: &str, text: Option<&str>) -> Result<()>;
    async fn deliver(&self, delivery: &Delivery, sink: &dyn ProgressSink) -> Result<DeliveredRef>;
    /// Copies a delivered item to the audit channel.
    async fn mirror(&self, delivered: &DeliveredRef) -> Result<()>;
    /// Writes a text note to the audit channel.
    async fn audit(&self, text: &str) -> Result<()>;
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<SearchHit>>;
}

pub trait DiskStat: Send + Sync {
    fn free_bytes(&self) -> Result<u64>;
}
