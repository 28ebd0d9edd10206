//! `vidq search` – run a search query against the configured provider.

use anyhow::Result;
use vidq_core::adapters::YoutubeSearch;
use vidq_core::collab::SearchProvider;
use vidq_core::config::VidqConfig;

pub async fn run_search(cfg: &VidqConfig, query: &str) -> Result<()> {
    let search = cfg.search();
    let provider = YoutubeSearch::new(search.api_key);
    let hits = provider.search(query, search.max_results).await?;
    if hits.is_empty() {
        println!("No results found.");
    }
    for hit in hits {
        println!("{}\n  {}", hit.title, hit.url);
    }
    Ok(())
}
