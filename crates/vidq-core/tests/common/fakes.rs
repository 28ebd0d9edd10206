//! In-memory collaborators that record what the core asked of them.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use vidq_core::agent::{Sender, Services};
use vidq_core::collab::{
    ChatId, Choice, DeliveredRef, Delivery, DiskStat, FetchRequest, Fetcher, MediaResolver,
    MessagingHost, ProgressSink, SearchHit, SearchProvider, Surface, Transcoder,
};
use vidq_core::config::VidqConfig;
use vidq_core::media::{JobKind, RawFormat, ResolvedMedia};
use vidq_core::progress::ProgressSample;

#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    Reply { chat_id: ChatId, text: String, surface: Surface },
    Choices { surface: Surface, prompt: String, choices: Vec<Choice> },
    Status { surface: Surface, text: String },
    ClearChoices(Surface),
    Remove(Surface),
    Answer { callback_id: String, text: Option<String> },
    Deliver { delivery: Delivery, bytes: Vec<u8> },
    Mirror(DeliveredRef),
    Audit(String),
}

/// Messaging host that records every call. Delivery reads the file so tests
/// can check the bytes after the job's temp dir is gone.
#[derive(Default)]
pub struct FakeHost {
    events: Mutex<Vec<HostEvent>>,
    next_message: AtomicI64,
    /// 1-based delivery call that fails.
    pub fail_delivery_call: Mutex<Option<usize>>,
    /// Every mirror call fails.
    pub fail_mirror: AtomicBool,
    /// Every status edit fails, as if the surface had been deleted.
    pub fail_render: AtomicBool,
    deliveries: Mutex<usize>,
}

impl FakeHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_message: AtomicI64::new(100),
            ..Self::default()
        })
    }

    fn push(&self, event: HostEvent) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<HostEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn statuses(&self, surface: Surface) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                HostEvent::Status { surface: s, text } if s == surface => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn deliveries(&self) -> Vec<(Delivery, Vec<u8>)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                HostEvent::Deliver { delivery, bytes } => Some((delivery, bytes)),
                _ => None,
            })
            .collect()
    }

    pub fn answers(&self) -> Vec<Option<String>> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                HostEvent::Answer { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn replies(&self) -> Vec<(String, Surface)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                HostEvent::Reply { text, surface, .. } => Some((text, surface)),
                _ => None,
            })
            .collect()
    }

    /// The most recent menu, as (surface, choices).
    pub fn last_menu(&self) -> Option<(Surface, Vec<Choice>)> {
        self.events().into_iter().rev().find_map(|e| match e {
            HostEvent::Choices { surface, choices, .. } => Some((surface, choices)),
            _ => None,
        })
    }

    pub fn removed(&self) -> Vec<Surface> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                HostEvent::Remove(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn audits(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                HostEvent::Audit(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    pub fn mirrors(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, HostEvent::Mirror(_)))
            .count()
    }
}

#[async_trait]
impl MessagingHost for FakeHost {
    async fn reply(&self, chat_id: ChatId, text: &str) -> Result<Surface> {
        let surface = Surface {
            chat_id,
            message_id: self.next_message.fetch_add(1, Ordering::Relaxed),
        };
        self.push(HostEvent::Reply {
            chat_id,
            text: text.to_string(),
            surface,
        });
        Ok(surface)
    }

    async fn present_choices(&self, surface: &Surface, prompt: &str, choices: &[Choice]) -> Result<()> {
        self.push(HostEvent::Choices {
            surface: *surface,
            prompt: prompt.to_string(),
            choices: choices.to_vec(),
        });
        Ok(())
    }

    async fn render_status(&self, surface: &Surface, text: &str) -> Result<()> {
        if self.fail_render.load(Ordering::Relaxed) {
            anyhow::bail!("message to edit not found");
        }
        self.push(HostEvent::Status {
            surface: *surface,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn clear_choices(&self, surface: &Surface) -> Result<()> {
        self.push(HostEvent::ClearChoices(*surface));
        Ok(())
    }

    async fn remove_status(&self, surface: &Surface) -> Result<()> {
        self.push(HostEvent::Remove(*surface));
        Ok(())
    }

    async fn answer(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.push(HostEvent::Answer {
            callback_id: callback_id.to_string(),
            text: text.map(str::to_string),
        });
        Ok(())
    }

    async fn deliver(&self, delivery: &Delivery, sink: &dyn ProgressSink) -> Result<DeliveredRef> {
        let call = {
            let mut n = self.deliveries.lock().unwrap();
            *n += 1;
            *n
        };
        if *self.fail_delivery_call.lock().unwrap() == Some(call) {
            anyhow::bail!("upload connection reset");
        }
        let bytes = std::fs::read(&delivery.path)?;
        let len = bytes.len() as u64;
        sink.report(ProgressSample::new(len / 2, Some(len)));
        tokio::time::sleep(Duration::from_secs(1)).await;
        sink.report(ProgressSample::new(len, Some(len)));
        self.push(HostEvent::Deliver {
            delivery: delivery.clone(),
            bytes,
        });
        Ok(DeliveredRef {
            chat_id: delivery.chat_id,
            message_id: self.next_message.fetch_add(1, Ordering::Relaxed),
        })
    }

    async fn mirror(&self, delivered: &DeliveredRef) -> Result<()> {
        if self.fail_mirror.load(Ordering::Relaxed) {
            anyhow::bail!("audit channel unavailable");
        }
        self.push(HostEvent::Mirror(delivered.clone()));
        Ok(())
    }

    async fn audit(&self, text: &str) -> Result<()> {
        self.push(HostEvent::Audit(text.to_string()));
        Ok(())
    }
}

pub struct FakeResolver {
    pub media: ResolvedMedia,
    pub fail: bool,
}

#[async_trait]
impl MediaResolver for FakeResolver {
    async fn resolve(&self, reference: &str) -> Result<ResolvedMedia> {
        if self.fail {
            anyhow::bail!("unsupported URL: {}", reference);
        }
        Ok(self.media.clone())
    }
}

/// Writes `content` after `delay`, reporting progress every simulated second.
pub struct FakeFetcher {
    pub content: Vec<u8>,
    pub delay: Duration,
    pub fail: bool,
    /// Report success without writing a file.
    pub vanish: bool,
    /// Image URLs that fail.
    pub broken_images: Vec<String>,
    pub requests: Mutex<Vec<FetchRequest>>,
    pub image_requests: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new(content: Vec<u8>) -> Self {
        Self {
            content,
            delay: Duration::from_secs(3),
            fail: false,
            vanish: false,
            broken_images: Vec::new(),
            requests: Mutex::new(Vec::new()),
            image_requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, request: &FetchRequest, dest_dir: &Path, sink: &dyn ProgressSink) -> Result<PathBuf> {
        self.requests.lock().unwrap().push(request.clone());
        let total = self.content.len() as u64;
        let steps = self.delay.as_secs().max(1);
        for i in 1..=steps {
            tokio::time::sleep(Duration::from_secs(1)).await;
            sink.report(ProgressSample::new(total * i / steps, Some(total)));
        }
        if self.fail {
            anyhow::bail!("HTTP Error 403: Forbidden");
        }
        let ext = match request.kind {
            JobKind::Video => "mp4",
            JobKind::Audio => "webm",
        };
        let path = dest_dir.join(format!("{}.{}", request.file_stem, ext));
        if !self.vanish {
            std::fs::write(&path, &self.content)?;
        }
        Ok(path)
    }

    async fn fetch_image(&self, url: &str, dest: &Path) -> Result<()> {
        self.image_requests.lock().unwrap().push(url.to_string());
        if self.broken_images.iter().any(|u| u == url) {
            anyhow::bail!("HTTP 404");
        }
        std::fs::write(dest, b"jpeg")?;
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeTranscoder {
    pub fail_transcode: bool,
    pub file_duration: u64,
    pub extracted: Mutex<Vec<u64>>,
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn probe_duration(&self, _media: &Path) -> Result<u64> {
        Ok(self.file_duration)
    }

    async fn extract_thumbnail(&self, _media: &Path, offset_secs: u64, dest: &Path) -> Result<()> {
        self.extracted.lock().unwrap().push(offset_secs);
        std::fs::write(dest, b"frame")?;
        Ok(())
    }

    async fn normalize_image(&self, _path: &Path) -> Result<()> {
        Ok(())
    }

    async fn transcode_audio(&self, media: &Path) -> Result<PathBuf> {
        if self.fail_transcode {
            anyhow::bail!("libmp3lame missing");
        }
        let out = media.with_extension("mp3");
        std::fs::copy(media, &out)?;
        Ok(out)
    }
}

#[derive(Default)]
pub struct FakeSearch {
    pub hits: Vec<SearchHit>,
    pub fail: bool,
}

#[async_trait]
impl SearchProvider for FakeSearch {
    async fn search(&self, _query: &str, max_results: u32) -> Result<Vec<SearchHit>> {
        if self.fail {
            anyhow::bail!("quota exceeded");
        }
        Ok(self.hits.iter().take(max_results as usize).cloned().collect())
    }
}

pub struct FixedDisk(pub u64);

impl DiskStat for FixedDisk {
    fn free_bytes(&self) -> Result<u64> {
        Ok(self.0)
    }
}

pub fn format(id: &str, vcodec: &str, acodec: &str, height: Option<u32>, size: Option<u64>) -> RawFormat {
    RawFormat {
        format_id: id.to_string(),
        vcodec: Some(vcodec.to_string()),
        acodec: Some(acodec.to_string()),
        height,
        fps: Some(30.0),
        filesize: size,
        ext: Some("mp4".to_string()),
        ..RawFormat::default()
    }
}

/// 360p muxed (1000 bytes), 1080p video-only (2000 bytes), and a 128 kbps audio track.
pub fn sample_media() -> ResolvedMedia {
    let mut audio = format("140", "none", "mp4a.40.2", None, Some(500));
    audio.abr = Some(128.0);
    audio.ext = Some("m4a".to_string());
    ResolvedMedia {
        title: "Clip: Part/One".to_string(),
        duration_secs: 125,
        thumbnail: Some("https://i.ytimg.com/vi/x/maxresdefault.jpg".to_string()),
        formats: vec![
            format("18", "avc1", "mp4a.40.2", Some(360), Some(1000)),
            format("137", "avc1", "none", Some(1080), Some(2000)),
            audio,
        ],
    }
}

pub fn config(work_dir: &Path) -> VidqConfig {
    VidqConfig {
        work_dir: Some(work_dir.to_path_buf()),
        ..VidqConfig::default()
    }
}

pub fn user(user_id: i64) -> Sender {
    Sender {
        user_id,
        chat_id: user_id,
        handle: Some(format!("user{user_id}")),
        name: format!("User {user_id}"),
    }
}

pub struct Fakes {
    pub resolver: Arc<FakeResolver>,
    pub fetcher: Arc<FakeFetcher>,
    pub transcoder: Arc<FakeTranscoder>,
    pub search: Arc<FakeSearch>,
    pub disk: Arc<FixedDisk>,
}

impl Default for Fakes {
    fn default() -> Self {
        Self {
            resolver: Arc::new(FakeResolver {
                media: sample_media(),
                fail: false,
            }),
            fetcher: Arc::new(FakeFetcher::new(b"0123456789abcdefghijklmno".to_vec())),
            transcoder: Arc::new(FakeTranscoder::default()),
            search: Arc::new(FakeSearch::default()),
            disk: Arc::new(FixedDisk(u64::MAX)),
        }
    }
}

impl Fakes {
    pub fn services(&self) -> Services {
        Services {
            resolver: self.resolver.clone(),
            fetcher: self.fetcher.clone(),
            transcoder: self.transcoder.clone(),
            search: self.search.clone(),
            disk: self.disk.clone(),
        }
    }
}
