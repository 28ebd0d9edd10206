//! Turning raw resolver formats into the variant menu.

use serde::{Deserialize, Serialize};

use crate::config::FormatConfig;

const AV1_LOW_RES_IDS: [&str; 4] = ["394", "395", "396", "397"];
const AV1_HIGH_RES_IDS: [&str; 5] = ["398", "399", "400", "401", "402"];

/// One format as reported by the resolver (yt-dlp JSON field names).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFormat {
    pub format_id: String,
    #[serde(default)]
    pub vcodec: Option<String>,
    #[serde(default)]
    pub acodec: Option<String>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub fps: Option<f64>,
    #[serde(default)]
    pub filesize: Option<u64>,
    #[serde(default)]
    pub filesize_approx: Option<u64>,
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(default)]
    pub abr: Option<f64>,
}

impl RawFormat {
    /// A missing codec field counts as present; only an explicit "none" excludes.
    pub fn has_video(&self) -> bool {
        self.vcodec.as_deref() != Some("none")
    }

    pub fn has_audio(&self) -> bool {
        self.acodec.as_deref() != Some("none")
    }

    pub fn size(&self) -> Option<u64> {
        self.filesize.or(self.filesize_approx)
    }

    fn is_av1(&self) -> bool {
        self.vcodec
            .as_deref()
            .is_some_and(|c| c.to_ascii_lowercase().contains("av01"))
    }
}

/// A selectable video variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantOption {
    pub id: String,
    pub has_audio: bool,
    pub description: String,
    pub approx_size: Option<u64>,
}

/// Best audio-only format, used for "audio" jobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BestAudio {
    pub format_id: String,
    pub ext: String,
    pub approx_size: Option<u64>,
}

impl BestAudio {
    pub fn label(&self) -> String {
        format!(
            "Audio: best - {} (id: {}, ext: mp3)",
            size_label(self.approx_size),
            self.format_id
        )
    }
}

/// Menu label of the audio choice, which is offered even when the resolver
/// listed no audio-only format.
pub fn best_audio_label(best: Option<&BestAudio>) -> String {
    match best {
        Some(audio) => audio.label(),
        None => "Audio: best (no info)".to_string(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    pub variants: Vec<VariantOption>,
    pub best_audio: Option<BestAudio>,
}

fn size_label(size: Option<u64>) -> String {
    match size {
        Some(bytes) => format!("{:.2} MB", bytes as f64 / 1024.0 / 1024.0),
        None => "Unknown".to_string(),
    }
}

fn quality_label(f: &RawFormat) -> String {
    match f.height {
        Some(h) => {
            let mut label = format!("{h}p");
            if let Some(fps) = f.fps {
                let fps = fps as i64;
                if fps != 30 {
                    label.push_str(&fps.to_string());
                }
            }
            label
        }
        None => "Unknown".to_string(),
    }
}

fn excluded_by_policy(id: &str, formats: &FormatConfig) -> bool {
    (!formats.av1_low_res && AV1_LOW_RES_IDS.contains(&id))
        || (!formats.av1_high_res && AV1_HIGH_RES_IDS.contains(&id))
}

/// Builds the menu: every video format (minus disabled AV1 ids) in resolver
/// order, plus the audio-only format with the highest bitrate.
pub fn build_catalog(formats: &[RawFormat], policy: &FormatConfig) -> Catalog {
    let variants = formats
        .iter()
        .filter(|f| f.has_video())
        .filter(|f| !excluded_by_policy(&f.format_id, policy))
        .map(|f| {
            let ext = if f.is_av1() {
                "mp4-av1".to_string()
            } else {
                f.ext.clone().unwrap_or_else(|| "unknown".to_string())
            };
            VariantOption {
                id: f.format_id.clone(),
                has_audio: f.has_audio(),
                description: format!("{} - {} (ext: {})", quality_label(f), size_label(f.size()), ext),
                approx_size: f.size(),
            }
        })
        .collect();

    let best_audio = formats
        .iter()
        .filter(|f| !f.has_video() && f.has_audio())
        .fold(None::<&RawFormat>, |best, f| match best {
            Some(b) if b.abr.unwrap_or(0.0) >= f.abr.unwrap_or(0.0) => Some(b),
            _ => Some(f),
        })
        .map(|f| BestAudio {
            format_id: f.format_id.clone(),
            ext: f.ext.clone().unwrap_or_else(|| "m4a".to_string()),
            approx_size: f.size(),
        });

    Catalog {
        variants,
        best_audio,
    }
}
