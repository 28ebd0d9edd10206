//! Messaging host that talks to a terminal.
//!
//! Every host message gets a numeric id and is printed as `[#id] text`.
//! Delivered files are copied into the output directory; mirrors and audit
//! notes are appended to `vidq-audit.log`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use vidq_core::collab::{
    ChatId, Choice, DeliveredRef, Delivery, MessagingHost, ProgressSink, Surface,
};
use vidq_core::progress::ProgressSample;

const AUDIT_LOG: &str = "vidq-audit.log";
const COPY_CHUNK: usize = 1024 * 1024;

/// The most recent menu, so `#N` input can be mapped to a choice.
#[derive(Debug, Clone)]
pub struct Keyboard {
    pub surface: Surface,
    pub choices: Vec<Choice>,
}

pub struct ConsoleHost {
    next_id: AtomicI64,
    out_dir: PathBuf,
    audit_dir: PathBuf,
    keyboard: Mutex<Option<Keyboard>>,
    /// Copies awaiting their mirror; each is mirrored once.
    delivered: Mutex<HashMap<i64, PathBuf>>,
}

impl ConsoleHost {
    /// `audit_dir` defaults to `out_dir` when not configured.
    pub fn new(out_dir: PathBuf, audit_dir: Option<PathBuf>) -> Self {
        let audit_dir = audit_dir.unwrap_or_else(|| out_dir.clone());
        Self {
            next_id: AtomicI64::new(1),
            out_dir,
            audit_dir,
            keyboard: Mutex::new(None),
            delivered: Mutex::new(HashMap::new()),
        }
    }

    pub fn audit_log_path(&self) -> PathBuf {
        self.audit_dir.join(AUDIT_LOG)
    }

    /// Looks up choice `n` (1-based) of the most recent menu.
    pub fn pick(&self, n: usize) -> Option<(Surface, Choice)> {
        let keyboard = self.keyboard.lock().unwrap_or_else(|e| e.into_inner());
        let kb = keyboard.as_ref()?;
        let choice = kb.choices.get(n.checked_sub(1)?)?;
        Some((kb.surface, choice.clone()))
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn drop_keyboard(&self, surface: &Surface) {
        let mut keyboard = self.keyboard.lock().unwrap_or_else(|e| e.into_inner());
        if keyboard.as_ref().is_some_and(|kb| kb.surface == *surface) {
            *keyboard = None;
        }
    }

    async fn append_audit(&self, line: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.audit_dir).await?;
        let path = self.audit_log_path();
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("open audit log {}", path.display()))?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        Ok(())
    }
}

/// Copies `src` to `dest` in chunks, reporting bytes written to `sink`.
async fn copy_with_progress(src: &Path, dest: &Path, sink: &dyn ProgressSink) -> Result<u64> {
    let mut input = tokio::fs::File::open(src)
        .await
        .with_context(|| format!("open {}", src.display()))?;
    let total = input.metadata().await?.len();
    let mut output = tokio::fs::File::create(dest)
        .await
        .with_context(|| format!("create {}", dest.display()))?;
    let mut buf = vec![0u8; COPY_CHUNK];
    let mut copied = 0u64;
    loop {
        let n = input.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        output.write_all(&buf[..n]).await?;
        copied += n as u64;
        sink.report(ProgressSample::new(copied, Some(total)));
    }
    output.flush().await?;
    Ok(copied)
}

#[async_trait]
impl MessagingHost for ConsoleHost {
    async fn reply(&self, chat_id: ChatId, text: &str) -> Result<Surface> {
        let surface = Surface {
            chat_id,
            message_id: self.next_id(),
        };
        println!("[#{}] {}", surface.message_id, text);
        Ok(surface)
    }

    async fn present_choices(&self, surface: &Surface, prompt: &str, choices: &[Choice]) -> Result<()> {
        println!("[#{}] {}", surface.message_id, prompt);
        for (i, choice) in choices.iter().enumerate() {
            println!("    #{:<3} {}", i + 1, choice.label);
        }
        *self.keyboard.lock().unwrap_or_else(|e| e.into_inner()) = Some(Keyboard {
            surface: *surface,
            choices: choices.to_vec(),
        });
        Ok(())
    }

    async fn render_status(&self, surface: &Surface, text: &str) -> Result<()> {
        self.drop_keyboard(surface);
        println!("[#{}] {}", surface.message_id, text);
        Ok(())
    }

    async fn clear_choices(&self, surface: &Surface) -> Result<()> {
        self.drop_keyboard(surface);
        Ok(())
    }

    async fn remove_status(&self, surface: &Surface) -> Result<()> {
        self.drop_keyboard(surface);
        println!("[#{}] (removed)", surface.message_id);
        Ok(())
    }

    async fn answer(&self, _callback_id: &str, text: Option<&str>) -> Result<()> {
        if let Some(text) = text {
            println!("  > {text}");
        }
        Ok(())
    }

    async fn deliver(&self, delivery: &Delivery, sink: &dyn ProgressSink) -> Result<DeliveredRef> {
        let name = delivery
            .path
            .file_name()
            .context("delivered path has no file name")?;
        tokio::fs::create_dir_all(&self.out_dir).await?;
        let dest = self.out_dir.join(name);
        let bytes = copy_with_progress(&delivery.path, &dest, sink).await?;

        let message_id = self.next_id();
        println!(
            "[#{}] delivered {} ({} bytes)\n{}",
            message_id,
            dest.display(),
            bytes,
            delivery.caption
        );
        self.delivered
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(message_id, dest);
        Ok(DeliveredRef {
            chat_id: delivery.chat_id,
            message_id,
        })
    }

    async fn mirror(&self, delivered: &DeliveredRef) -> Result<()> {
        let path = self
            .delivered
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&delivered.message_id)
            .with_context(|| format!("unknown delivered message {}", delivered.message_id))?;
        self.append_audit(&format!(
            "delivered {} to chat {} (message {})",
            path.display(),
            delivered.chat_id,
            delivered.message_id
        ))
        .await
    }

    async fn audit(&self, text: &str) -> Result<()> {
        self.append_audit(text).await
    }
}
