//! `vidq resolve` – print the quality menu a user would see for a link.

use anyhow::Result;
use vidq_core::adapters::YtDlp;
use vidq_core::collab::MediaResolver;
use vidq_core::config::VidqConfig;
use vidq_core::media::{best_audio_label, build_catalog, format_duration};

pub async fn run_resolve(cfg: &VidqConfig, url: &str) -> Result<()> {
    let resolver = YtDlp::from_tools(&cfg.tools()).await;
    let media = resolver.resolve(url).await?;
    let catalog = build_catalog(&media.formats, &cfg.formats());

    println!("{}", media.title);
    println!("Duration: {}", format_duration(media.duration_secs));
    if catalog.variants.is_empty() {
        println!("No usable variants.");
        return Ok(());
    }
    println!("{:<8} {}", "ID", "VARIANT");
    for v in &catalog.variants {
        println!("{:<8} {}", v.id, v.description);
    }
    println!("{:<8} {}", "audio", best_audio_label(catalog.best_audio.as_ref()));
    Ok(())
}
