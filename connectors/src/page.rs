//! External page fetcher.
//!
//! Used only for posts that carry an attached link: the page body is
//! fetched, stripped to visible text and truncated before the language
//! model summarizes it.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;

static SCRIPT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(script|style|noscript)[^>]*>.*?</(script|style|noscript)>").unwrap());
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

#[async_trait]
pub trait PageReader: Send + Sync {
    /// Visible text of the page at `url`, truncated to a model-friendly length.
    async fn read(&self, url: &str) -> Result<String>;
}

pub struct HttpPageReader {
    client: Client,
    max_chars: usize,
}

impl HttpPageReader {
    pub fn new(timeout_secs: u64, max_chars: usize) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self { client, max_chars }
    }
}

#[async_trait]
impl PageReader for HttpPageReader {
    async fn read(&self, url: &str) -> Result<String> {
        let body = self
            .client
            .get(url)
            .send()
            .await
            .context("fetching page")?
            .error_for_status()?
            .text()
            .await
            .context("reading page body")?;

        Ok(strip_html(&body, self.max_chars))
    }
}

/// Reduce an HTML document to whitespace-normalized visible text.
pub fn strip_html(html: &str, max_chars: usize) -> String {
    let without_blocks = SCRIPT_RE.replace_all(html, " ");
    let without_tags = TAG_RE.replace_all(&without_blocks, " ");
    let text = WS_RE.replace_all(&without_tags, " ");
    let text = text.trim();

    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
