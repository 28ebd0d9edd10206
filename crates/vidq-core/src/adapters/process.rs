//! Running external tools and reporting their failures.

use anyhow::{Context, Result};
use std::process::{Output, Stdio};
use tokio::process::Command;

/// Last few stderr lines, enough to tell what went wrong.
pub(super) fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(5);
    lines[start..].join("\n")
}

/// Runs `cmd` to completion, failing on a non-zero exit with the stderr tail.
pub(super) async fn run_checked(mut cmd: Command, what: &str) -> Result<Output> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    let output = cmd
        .output()
        .await
        .with_context(|| format!("failed to start {what}"))?;
    if !output.status.success() {
        anyhow::bail!(
            "{} exited with {}: {}",
            what,
            output.status,
            stderr_tail(&output.stderr)
        );
    }
    Ok(output)
}
