//! yt-dlp as media resolver and fetcher.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::collab::{FetchRequest, Fetcher, MediaResolver, ProgressSink};
use crate::config::{cookies_cache_path, ToolsConfig};
use crate::media::{JobKind, RawFormat, ResolvedMedia};
use crate::progress::ProgressSample;

use super::http;
use super::process::{run_checked, stderr_tail};

const PROGRESS_PREFIX: &str = "vidq-progress";
const THUMBNAIL_TIMEOUT: Duration = Duration::from_secs(10);
const COOKIES_TIMEOUT: Duration = Duration::from_secs(30);

pub struct YtDlp {
    program: String,
    cookies: Option<PathBuf>,
}

/// The subset of `yt-dlp -J` output we read.
#[derive(Debug, Deserialize)]
struct InfoJson {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(default)]
    formats: Vec<RawFormat>,
}

impl YtDlp {
    pub fn new(program: impl Into<String>, cookies: Option<PathBuf>) -> Self {
        Self {
            program: program.into(),
            cookies,
        }
    }

    /// Builds the adapter from `[tools]`, fetching `cookies_url` first when set.
    pub async fn from_tools(tools: &ToolsConfig) -> Self {
        let cookies = match &tools.cookies_url {
            Some(url) => match cookies_cache_path() {
                Ok(dest) => download_cookies(url, &dest, tools.cookies_file.clone()).await,
                Err(e) => {
                    tracing::error!("no place for downloaded cookies: {:#}", e);
                    tools.cookies_file.clone()
                }
            },
            None => tools.cookies_file.clone(),
        };
        Self::new(tools.yt_dlp.clone(), cookies)
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--no-warnings").arg("--no-playlist");
        if let Some(cookies) = self.cookies.as_ref().filter(|p| p.exists()) {
            cmd.arg("--cookies").arg(cookies);
        }
        cmd
    }
}

/// Saves `url` to `dest`. A failed download is logged and `fallback` is used instead.
async fn download_cookies(url: &str, dest: &Path, fallback: Option<PathBuf>) -> Option<PathBuf> {
    let fetched = async {
        let body = http::get_async(url.to_string(), COOKIES_TIMEOUT).await?;
        tokio::fs::write(dest, body)
            .await
            .with_context(|| format!("write {}", dest.display()))
    };
    match fetched.await {
        Ok(()) => {
            tracing::info!(path = %dest.display(), "cookies downloaded");
            Some(dest.to_path_buf())
        }
        Err(e) => {
            tracing::error!("cookies download failed: {:#}", e);
            fallback
        }
    }
}

/// Parses one `yt-dlp -J` document.
pub(crate) fn parse_info(json: &[u8]) -> Result<ResolvedMedia> {
    let info: InfoJson = serde_json::from_slice(json).context("parse yt-dlp JSON")?;
    Ok(ResolvedMedia {
        title: info.title.unwrap_or_else(|| "Video".to_string()),
        duration_secs: info.duration.map(|d| d.max(0.0).round() as u64).unwrap_or(0),
        thumbnail: info.thumbnail,
        formats: info.formats,
    })
}

/// Parses a line printed by our progress template:
/// `vidq-progress <downloaded> <total> <total_estimate> <eta>`, `NA` for unknowns.
pub fn parse_progress_line(line: &str) -> Option<ProgressSample> {
    let mut fields = line.split_whitespace();
    if fields.next()? != PROGRESS_PREFIX {
        return None;
    }
    let num = |s: Option<&str>| -> Option<u64> {
        s.and_then(|v| v.parse::<f64>().ok())
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(|v| v as u64)
    };
    let current = num(fields.next())?;
    let total = num(fields.next());
    let estimate = num(fields.next());
    let eta = num(fields.next());
    Some(ProgressSample {
        current,
        total: total.or(estimate),
        eta_hint: eta,
    })
}

/// Finds what yt-dlp wrote for `stem` when it did not print a path.
fn find_output(dir: &Path, stem: &str) -> Option<PathBuf> {
    let prefix = format!("{stem}.");
    std::fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .find(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(&prefix) && !n.ends_with(".part"))
        })
}

#[async_trait]
impl MediaResolver for YtDlp {
    async fn resolve(&self, reference: &str) -> Result<ResolvedMedia> {
        let mut cmd = self.command();
        cmd.arg("-J").arg(reference);
        let output = run_checked(cmd, "yt-dlp").await?;
        let media = parse_info(&output.stdout)?;
        tracing::debug!(
            reference,
            formats = media.formats.len(),
            "resolved media"
        );
        Ok(media)
    }
}

#[async_trait]
impl Fetcher for YtDlp {
    async fn fetch(
        &self,
        request: &FetchRequest,
        dest_dir: &Path,
        sink: &dyn ProgressSink,
    ) -> Result<PathBuf> {
        let template = dest_dir.join(format!("{}.%(ext)s", request.file_stem));
        let mut cmd = self.command();
        cmd.arg("-f")
            .arg(&request.format)
            .arg("-o")
            .arg(&template)
            .arg("--newline")
            .arg("--progress")
            .arg("--progress-template")
            .arg(format!(
                "download:{PROGRESS_PREFIX} %(progress.downloaded_bytes)s %(progress.total_bytes)s %(progress.total_bytes_estimate)s %(progress.eta)s"
            ))
            .arg("--print")
            .arg("after_move:filepath");
        if request.kind == JobKind::Video {
            cmd.arg("--merge-output-format").arg("mp4");
        }
        cmd.arg(&request.reference)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().context("failed to start yt-dlp")?;
        let stdout = child.stdout.take().context("yt-dlp stdout not captured")?;
        let stderr = child.stderr.take().context("yt-dlp stderr not captured")?;

        // Progress may land on either stream depending on yt-dlp's quiet mode.
        let mut out_lines = BufReader::new(stdout).lines();
        let mut err_lines = BufReader::new(stderr).lines();
        let mut printed: Option<PathBuf> = None;
        let mut diagnostics: Vec<u8> = Vec::new();
        let (mut out_done, mut err_done) = (false, false);
        while !(out_done && err_done) {
            tokio::select! {
                line = out_lines.next_line(), if !out_done => {
                    match line.context("read yt-dlp stdout")? {
                        Some(line) => match parse_progress_line(&line) {
                            Some(sample) => sink.report(sample),
                            None if !line.trim().is_empty() => {
                                printed = Some(PathBuf::from(line.trim()));
                            }
                            None => {}
                        },
                        None => out_done = true,
                    }
                }
                line = err_lines.next_line(), if !err_done => {
                    match line.context("read yt-dlp stderr")? {
                        Some(line) => match parse_progress_line(&line) {
                            Some(sample) => sink.report(sample),
                            None => {
                                diagnostics.extend_from_slice(line.as_bytes());
                                diagnostics.push(b'\n');
                            }
                        },
                        None => err_done = true,
                    }
                }
            }
        }

        let status = child.wait().await.context("wait for yt-dlp")?;
        if !status.success() {
            anyhow::bail!("yt-dlp exited with {}: {}", status, stderr_tail(&diagnostics));
        }
        printed
            .filter(|p| p.exists())
            .or_else(|| find_output(dest_dir, &request.file_stem))
            .context("yt-dlp finished without producing a file")
    }

    async fn fetch_image(&self, url: &str, dest: &Path) -> Result<()> {
        let body = http::get_async(url.to_string(), THUMBNAIL_TIMEOUT).await?;
        if body.is_empty() {
            anyhow::bail!("empty image body from {}", url);
        }
        tokio::fs::write(dest, body)
            .await
            .with_context(|| format!("write {}", dest.display()))
    }
}
