//! ffmpeg/ffprobe as transcoder and prober.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use crate::collab::Transcoder;

use super::process::run_checked;

pub struct Ffmpeg {
    ffmpeg: String,
    ffprobe: String,
}

impl Ffmpeg {
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    fn ffmpeg(&self) -> Command {
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(["-hide_banner", "-nostdin", "-y", "-v", "error"]);
        cmd
    }
}

/// Parses ffprobe's bare `format=duration` output, rounded to whole seconds.
fn parse_duration(stdout: &[u8]) -> Result<u64> {
    let text = String::from_utf8_lossy(stdout);
    let secs: f64 = text
        .trim()
        .parse()
        .with_context(|| format!("unexpected ffprobe duration {:?}", text.trim()))?;
    if !secs.is_finite() || secs < 0.0 {
        anyhow::bail!("invalid duration {}", secs);
    }
    Ok(secs.round() as u64)
}

/// Output path for the MP3 rendition of `media`, never equal to `media`.
fn mp3_path(media: &Path) -> PathBuf {
    let out = media.with_extension("mp3");
    if out == media {
        let stem = media
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());
        media.with_file_name(format!("{stem}.transcoded.mp3"))
    } else {
        out
    }
}

#[async_trait]
impl Transcoder for Ffmpeg {
    async fn probe_duration(&self, media: &Path) -> Result<u64> {
        let mut cmd = Command::new(&self.ffprobe);
        cmd.args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(media);
        let output = run_checked(cmd, "ffprobe").await?;
        parse_duration(&output.stdout)
    }

    async fn extract_thumbnail(&self, media: &Path, offset_secs: u64, dest: &Path) -> Result<()> {
        let mut cmd = self.ffmpeg();
        cmd.arg("-ss")
            .arg(offset_secs.to_string())
            .arg("-i")
            .arg(media)
            .args(["-frames:v", "1", "-q:v", "2"])
            .arg(dest);
        run_checked(cmd, "ffmpeg").await?;
        if !dest.exists() {
            anyhow::bail!("ffmpeg wrote no frame at {}s", offset_secs);
        }
        Ok(())
    }

    async fn normalize_image(&self, path: &Path) -> Result<()> {
        let tmp = path.with_extension("rgb.jpg");
        let mut cmd = self.ffmpeg();
        cmd.arg("-i")
            .arg(path)
            .args(["-frames:v", "1", "-c:v", "mjpeg", "-pix_fmt", "yuvj444p", "-q:v", "2"])
            .args(["-f", "image2"])
            .arg(&tmp);
        run_checked(cmd, "ffmpeg").await?;
        tokio::fs::rename(&tmp, path)
            .await
            .with_context(|| format!("replace {}", path.display()))
    }

    async fn transcode_audio(&self, media: &Path) -> Result<PathBuf> {
        let out = mp3_path(media);
        let mut cmd = self.ffmpeg();
        cmd.arg("-i")
            .arg(media)
            .args(["-vn", "-c:a", "libmp3lame", "-q:a", "0"])
            .arg(&out);
        run_checked(cmd, "ffmpeg").await?;
        tracing::debug!(from = %media.display(), to = %out.display(), "audio transcoded");
        Ok(out)
    }
}
