//! Thumbnail preparation for video deliveries. Every failure here is soft.

use std::path::{Path, PathBuf};

use crate::collab::{Fetcher, Transcoder};
use crate::error::best_effort;

/// Offset of the fallback frame.
pub(super) const FRAME_OFFSET_SECS: u64 = 10;

/// Fetches and normalizes the remote thumbnail, or extracts a frame from the
/// media. `None` means the delivery goes out without one.
pub(super) async fn prepare(
    fetcher: &dyn Fetcher,
    transcoder: &dyn Transcoder,
    remote: Option<&str>,
    media: &Path,
    dir: &Path,
) -> Option<PathBuf> {
    let dest = dir.join("thumbnail.jpg");
    if let Some(url) = remote {
        if fetch_remote(fetcher, url, &dest).await
            && best_effort("normalize thumbnail", transcoder.normalize_image(&dest).await).is_some()
        {
            return Some(dest);
        }
    }
    best_effort(
        "extract thumbnail frame",
        transcoder
            .extract_thumbnail(media, FRAME_OFFSET_SECS, &dest)
            .await,
    )
    .map(|_| dest)
}

async fn fetch_remote(fetcher: &dyn Fetcher, url: &str, dest: &Path) -> bool {
    match fetcher.fetch_image(url, dest).await {
        Ok(()) => true,
        Err(e) if url.contains("maxresdefault") => {
            tracing::debug!("maxres thumbnail unavailable ({:#}), trying hqdefault", e);
            let fallback = url.replace("maxresdefault", "hqdefault");
            best_effort("fetch thumbnail", fetcher.fetch_image(&fallback, dest).await).is_some()
        }
        Err(e) => {
            tracing::warn!("fetch thumbnail failed (ignored): {:#}", e);
            false
        }
    }
}
