//! Search provider backed by the YouTube Data API v3.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::collab::{SearchHit, SearchProvider};

use super::http;

const SEARCH_ENDPOINT: &str = "https://www.googleapis.com/youtube/v3/search";
const WATCH_URL: &str = "https://www.youtube.com/watch?v=";
const SEARCH_TIMEOUT: Duration = Duration::from_secs(15);

pub struct YoutubeSearch {
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: ItemId,
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
struct ItemId {
    #[serde(rename = "videoId", default)]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Snippet {
    #[serde(default)]
    title: String,
}

impl YoutubeSearch {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }

    fn request_url(&self, query: &str, max_results: u32) -> Result<String> {
        let max = max_results.to_string();
        let url = url::Url::parse_with_params(
            SEARCH_ENDPOINT,
            &[
                ("key", self.api_key.as_str()),
                ("q", query),
                ("part", "snippet"),
                ("maxResults", max.as_str()),
                ("type", "video"),
            ],
        )
        .context("build search URL")?;
        Ok(url.into())
    }
}

/// Turns an API response body into hits; items without a video id are skipped.
pub fn parse_search_response(body: &[u8]) -> Result<Vec<SearchHit>> {
    let response: SearchResponse =
        serde_json::from_slice(body).context("parse search response")?;
    Ok(response
        .items
        .into_iter()
        .filter_map(|item| {
            let id = item.id.video_id?;
            Some(SearchHit {
                title: item.snippet.title,
                url: format!("{WATCH_URL}{id}"),
            })
        })
        .collect())
}

#[async_trait]
impl SearchProvider for YoutubeSearch {
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<SearchHit>> {
        if self.api_key.is_empty() {
            anyhow::bail!("search API key is not configured");
        }
        let url = self.request_url(query, max_results)?;
        let body = http::get_async(url, SEARCH_TIMEOUT).await?;
        let hits = parse_search_response(&body)?;
        tracing::debug!(query, hits = hits.len(), "search finished");
        Ok(hits)
    }
}
