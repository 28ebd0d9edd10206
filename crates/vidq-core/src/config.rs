use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::storage::SplitPolicy;

/// Largest artifact the messaging host accepts as a single upload (2000 MiB).
pub const DEFAULT_DELIVERY_CEILING: u64 = 2_097_152_000;

const DEFAULT_PROGRESS_INTERVAL_SECS: u64 = 7;
const DEFAULT_SELECTION_TIMEOUT_SECS: u64 = 60;

/// Which AV1 renditions are offered to users (optional `[formats]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatConfig {
    /// Offer AV1 for 144p–480p (format ids 394–397).
    pub av1_low_res: bool,
    /// Offer AV1 for 720p and above (format ids 398–402).
    pub av1_high_res: bool,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            av1_low_res: true,
            av1_high_res: true,
        }
    }
}

/// External program locations (optional `[tools]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    pub yt_dlp: String,
    pub ffmpeg: String,
    pub ffprobe: String,
    /// Netscape cookies file handed to yt-dlp when it exists.
    #[serde(default)]
    pub cookies_file: Option<PathBuf>,
    /// Downloaded once at startup into the state dir and preferred over `cookies_file`.
    #[serde(default)]
    pub cookies_url: Option<String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            yt_dlp: "yt-dlp".to_string(),
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            cookies_file: None,
            cookies_url: None,
        }
    }
}

/// Search provider settings (optional `[search]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// YouTube Data API v3 key; search is disabled when empty.
    pub api_key: String,
    pub max_results: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            max_results: 20,
        }
    }
}

/// Global configuration loaded from `~/.config/vidq/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VidqConfig {
    /// Seconds between progress edits on a status surface. 0 selects the default.
    pub progress_interval_secs: u64,
    /// Seconds a quality menu stays open before it is cancelled.
    pub selection_timeout_secs: u64,
    /// Artifacts larger than this are split before delivery.
    pub delivery_ceiling_bytes: u64,
    /// How oversized artifacts are cut: "fixed" (ceiling-sized parts) or "equal".
    pub split_policy: SplitPolicy,
    /// Users allowed to submit requests. Empty allows everyone.
    #[serde(default)]
    pub allowed_users: Vec<i64>,
    /// Parent directory for per-job scratch directories (None = system temp dir).
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
    /// Directory where the console host mirrors delivered files (None = no mirror copies).
    #[serde(default)]
    pub audit_dir: Option<PathBuf>,
    #[serde(default)]
    pub formats: Option<FormatConfig>,
    #[serde(default)]
    pub tools: Option<ToolsConfig>,
    #[serde(default)]
    pub search: Option<SearchConfig>,
}

impl Default for VidqConfig {
    fn default() -> Self {
        Self {
            progress_interval_secs: DEFAULT_PROGRESS_INTERVAL_SECS,
            selection_timeout_secs: DEFAULT_SELECTION_TIMEOUT_SECS,
            delivery_ceiling_bytes: DEFAULT_DELIVERY_CEILING,
            split_policy: SplitPolicy::default(),
            allowed_users: Vec::new(),
            work_dir: None,
            audit_dir: None,
            formats: None,
            tools: None,
            search: None,
        }
    }
}

impl VidqConfig {
    /// Progress edit interval: 0 means the default, anything else is clamped to at least 1s.
    pub fn progress_interval(&self) -> Duration {
        let secs = match self.progress_interval_secs {
            0 => DEFAULT_PROGRESS_INTERVAL_SECS,
            n => n.max(1),
        };
        Duration::from_secs(secs)
    }

    pub fn selection_timeout(&self) -> Duration {
        Duration::from_secs(self.selection_timeout_secs)
    }

    pub fn work_dir(&self) -> PathBuf {
        self.work_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn formats(&self) -> FormatConfig {
        self.formats.clone().unwrap_or_default()
    }

    pub fn tools(&self) -> ToolsConfig {
        self.tools.clone().unwrap_or_default()
    }

    pub fn search(&self) -> SearchConfig {
        self.search.clone().unwrap_or_default()
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("vidq")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Where a cookies file fetched from `cookies_url` is kept.
pub fn cookies_cache_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("vidq")?;
    Ok(xdg_dirs.place_state_file("cookies.txt")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<VidqConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = VidqConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: VidqConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = VidqConfig::default();
        assert_eq!(cfg.progress_interval(), Duration::from_secs(7));
        assert_eq!(cfg.selection_timeout(), Duration::from_secs(60));
        assert_eq!(cfg.delivery_ceiling_bytes, 2_097_152_000);
        assert_eq!(cfg.split_policy, SplitPolicy::FixedSize);
        assert!(cfg.allowed_users.is_empty());
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = VidqConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: VidqConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.progress_interval_secs, cfg.progress_interval_secs);
        assert_eq!(parsed.delivery_ceiling_bytes, cfg.delivery_ceiling_bytes);
        assert_eq!(parsed.split_policy, cfg.split_policy);
    }

    #[test]
    fn progress_interval_zero_means_default() {
        let cfg = VidqConfig {
            progress_interval_secs: 0,
            ..VidqConfig::default()
        };
        assert_eq!(cfg.progress_interval(), Duration::from_secs(7));
        let cfg = VidqConfig {
            progress_interval_secs: 1,
            ..VidqConfig::default()
        };
        assert_eq!(cfg.progress_interval(), Duration::from_secs(1));
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            progress_interval_secs = 3
            selection_timeout_secs = 30
            delivery_ceiling_bytes = 1048576
            split_policy = "equal"
            allowed_users = [1001, 1002]

            [formats]
            av1_low_res = false
            av1_high_res = true

            [tools]
            yt_dlp = "/opt/bin/yt-dlp"
            ffmpeg = "ffmpeg"
            ffprobe = "ffprobe"
            cookies_file = "/srv/cookies.txt"
            cookies_url = "https://files.example.com/cookies.txt"

            [search]
            api_key = "k"
            max_results = 5
        "#;
        let cfg: VidqConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.progress_interval(), Duration::from_secs(3));
        assert_eq!(cfg.split_policy, SplitPolicy::EqualParts);
        assert_eq!(cfg.allowed_users, [1001, 1002]);
        assert!(!cfg.formats().av1_low_res);
        assert_eq!(cfg.tools().yt_dlp, "/opt/bin/yt-dlp");
        assert_eq!(
            cfg.tools().cookies_file.as_deref(),
            Some(std::path::Path::new("/srv/cookies.txt"))
        );
        assert_eq!(
            cfg.tools().cookies_url.as_deref(),
            Some("https://files.example.com/cookies.txt")
        );
        assert_eq!(cfg.search().max_results, 5);
    }

    #[test]
    fn optional_sections_fall_back_to_defaults() {
        let toml = r#"
            progress_interval_secs = 7
            selection_timeout_secs = 60
            delivery_ceiling_bytes = 2097152000
            split_policy = "fixed"
        "#;
        let cfg: VidqConfig = toml::from_str(toml).unwrap();
        assert!(cfg.formats.is_none());
        assert!(cfg.formats().av1_high_res);
        assert_eq!(cfg.tools().ffmpeg, "ffmpeg");
        assert!(cfg.tools().cookies_url.is_none());
        assert!(cfg.search().api_key.is_empty());
        assert!(cfg.allowed_users.is_empty());
    }
}
