//! GDELT news search.
//!
//! GDELT provides free global news data; the doc API is queried per
//! keyword set and reduced to url/title/snippet rows.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use common::config::SearchConfig;

use crate::websearch::{SearchHit, SearchProvider};

pub struct GdeltNews {
    api_url: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct GdeltResponse {
    #[serde(default)]
    articles: Vec<GdeltArticle>,
}

#[derive(Debug, Deserialize)]
struct GdeltArticle {
    url: String,
    title: String,
    #[serde(default)]
    seendate: String,
    #[serde(default)]
    domain: String,
}

impl GdeltNews {
    pub fn new(cfg: &SearchConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            api_url: cfg.gdelt_url.clone(),
            client,
        }
    }
}

#[async_trait]
impl SearchProvider for GdeltNews {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let response = self
            .client
            .get(&self.api_url)
            .query(&[
                ("query", query),
                ("mode", "artlist"),
                ("maxrecords", &limit.to_string()),
                ("format", "json"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("GDELT API error: {}", response.status()));
        }

        let parsed: GdeltResponse = response.json().await?;

        Ok(parsed
            .articles
            .into_iter()
            .take(limit)
            .map(|a| SearchHit {
                url: a.url,
                snippet: format!("{} ({} {})", a.title, a.domain, a.seendate),
                title: a.title,
            })
            .collect())
    }
}
