//! Media metadata model: raw resolver formats, the variant catalog offered to
//! users, and the naming/caption helpers used when delivering.

mod catalog;
mod naming;

use serde::{Deserialize, Serialize};

pub use catalog::{best_audio_label, build_catalog, BestAudio, Catalog, RawFormat, VariantOption};
pub use naming::{caption, format_duration, sanitize_filename};

/// Variant id used for "best audio only" selections.
pub const BEST_AUDIO: &str = "bestaudio";

/// Output of a media resolver for one reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedMedia {
    pub title: String,
    #[serde(default)]
    pub duration_secs: u64,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub formats: Vec<RawFormat>,
}

/// What the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Video,
    Audio,
}

impl JobKind {
    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::Video => "video",
            JobKind::Audio => "audio",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "video" => Some(JobKind::Video),
            "audio" => Some(JobKind::Audio),
            _ => None,
        }
    }

    /// Container of the delivered artifact.
    pub fn delivery_ext(self) -> &'static str {
        match self {
            JobKind::Video => "mp4",
            JobKind::Audio => "mp3",
        }
    }
}

/// Everything known about one resolved reference. Cloned into each job so a
/// later resolution for the same user never changes queued work.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaSnapshot {
    pub reference: String,
    pub title: String,
    pub duration_secs: u64,
    pub thumbnail: Option<String>,
    pub variants: Vec<VariantOption>,
    pub best_audio: Option<BestAudio>,
}

impl MediaSnapshot {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            ..Self::default()
        }
    }

    pub fn variant(&self, id: &str) -> Option<&VariantOption> {
        self.variants.iter().find(|v| v.id == id)
    }

    /// True if `kind`/`variant_id` names something this snapshot offers.
    /// Best audio is always on offer; the resolver picks it at fetch time.
    pub fn offers(&self, kind: JobKind, variant_id: &str) -> bool {
        match kind {
            JobKind::Video => self.variant(variant_id).is_some(),
            JobKind::Audio => variant_id == BEST_AUDIO,
        }
    }

    /// Approximate size of the chosen variant (0 if unknown).
    pub fn approx_size(&self, kind: JobKind, variant_id: &str) -> u64 {
        let size = match kind {
            JobKind::Video => self.variant(variant_id).and_then(|v| v.approx_size),
            JobKind::Audio => self.best_audio.as_ref().and_then(|a| a.approx_size),
        };
        size.unwrap_or(0)
    }

    /// yt-dlp style format selector for the chosen variant.
    pub fn format_selector(&self, kind: JobKind, variant_id: &str) -> String {
        match kind {
            JobKind::Audio => BEST_AUDIO.to_string(),
            JobKind::Video => match self.variant(variant_id) {
                Some(v) if !v.has_audio => format!("{}+{}", v.id, BEST_AUDIO),
                _ => variant_id.to_string(),
            },
        }
    }

    /// Human description of the chosen quality for captions.
    pub fn quality_line(&self, kind: JobKind, variant_id: &str) -> String {
        let duration = format_duration(self.duration_secs);
        match kind {
            JobKind::Video => {
                let desc = self
                    .variant(variant_id)
                    .map(|v| v.description.as_str())
                    .unwrap_or(variant_id);
                format!("Quality: {desc}, Format: mp4, Duration: {duration}")
            }
            JobKind::Audio => format!("Quality: best, Format: mp3, Duration: {duration}"),
        }
    }
}
