//! Small blocking HTTP GET over libcurl.

use anyhow::{Context, Result};
use std::time::Duration;

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// GETs `url` and returns the body. Non-2xx responses are errors.
/// Runs in the current thread; call from `spawn_blocking` in async code.
pub(super) fn get(url: &str, timeout: Duration) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    let mut easy = curl::easy::Easy::new();
    easy.url(url).context("invalid URL")?;
    easy.follow_location(true)?;
    easy.useragent(USER_AGENT)?;
    easy.connect_timeout(Duration::from_secs(15))?;
    easy.timeout(timeout)?;
    {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform().context("GET request failed")?;
    }
    let code = easy.response_code().context("no response code")?;
    if !(200..300).contains(&code) {
        anyhow::bail!("GET returned HTTP {}", code);
    }
    Ok(body)
}

/// Async wrapper around [`get`].
pub(super) async fn get_async(url: String, timeout: Duration) -> Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || get(&url, timeout))
        .await
        .context("HTTP task failed")?
}
