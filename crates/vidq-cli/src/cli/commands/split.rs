//! `vidq split` – cut a file into delivery-sized parts.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use vidq_core::storage::{split_file, SplitPolicy};

pub async fn run_split(path: &Path, policy: SplitPolicy, ceiling: u64, out_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("create output dir {}", out_dir.display()))?;
    let source: PathBuf = path.to_path_buf();
    let out: PathBuf = out_dir.to_path_buf();
    let parts = tokio::task::spawn_blocking(move || split_file(&source, &out, ceiling, policy))
        .await
        .context("split task panicked")??;

    for part in &parts {
        println!("{:<4} {:>14} {}", part.index, part.size_bytes, part.path.display());
    }
    tracing::info!(parts = parts.len(), "split {}", path.display());
    Ok(())
}
