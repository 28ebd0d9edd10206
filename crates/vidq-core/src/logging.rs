//! Tracing setup for the CLI: an append-only `vidq.log` in the XDG state dir,
//! or stderr when that file cannot be opened.

use anyhow::{anyhow, Context, Result};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

const LOG_FILE: &str = "vidq.log";
const DEFAULT_DIRECTIVES: &str = "info,vidq=debug,vidq_core=debug";

/// Directives from `RUST_LOG` when set and valid, otherwise the vidq defaults.
fn filter_from(directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVES))
}

pub fn log_file_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("vidq")?;
    Ok(xdg_dirs.place_state_file(LOG_FILE)?)
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open log file {}", path.display()))
}

fn install<W>(writer: W) -> Result<()>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(filter_from(directives.as_deref()))
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow!("install subscriber: {}", e))
}

/// Logs to the state-dir file and returns its path. An error leaves no
/// subscriber installed, so the caller can still use [`init_logging_stderr`].
pub fn init_logging() -> Result<PathBuf> {
    let path = log_file_path()?;
    let file = open_append(&path)?;
    install(Mutex::new(file))?;
    tracing::info!(path = %path.display(), "logging to file");
    Ok(path)
}

pub fn init_logging_stderr() {
    // A subscriber installed earlier wins.
    let _ = install(std::io::stderr);
}
