//! Collaborators backed by external programs and HTTP.
//!
//! `yt-dlp` resolves and fetches, `ffmpeg`/`ffprobe` transcode and probe, and
//! the YouTube Data API answers searches. Blocking curl transfers run on the
//! blocking pool; child processes use `tokio::process`.

mod ffmpeg;
mod http;
mod process;
mod youtube_search;
mod ytdlp;

use std::sync::Arc;

use crate::agent::Services;
use crate::config::VidqConfig;
use crate::storage::StatvfsDisk;

pub use ffmpeg::Ffmpeg;
pub use youtube_search::{parse_search_response, YoutubeSearch};
pub use ytdlp::{parse_progress_line, YtDlp};

/// Wires the process-backed collaborators from config. Downloads the
/// configured cookies file before returning.
pub async fn process_services(cfg: &VidqConfig) -> Services {
    let tools = cfg.tools();
    let search = cfg.search();
    let ytdlp = Arc::new(YtDlp::from_tools(&tools).await);
    Services {
        resolver: ytdlp.clone(),
        fetcher: ytdlp,
        transcoder: Arc::new(Ffmpeg::new(tools.ffmpeg, tools.ffprobe)),
        search: Arc::new(YoutubeSearch::new(search.api_key)),
        disk: Arc::new(StatvfsDisk::new(cfg.work_dir())),
    }
}
