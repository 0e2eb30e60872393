//! Social feed post source.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};

use common::config::FeedConfig;
use common::types::Post;

#[async_trait]
pub trait PostSource: Send + Sync {
    /// Latest posts for an account, newest first. Returns an empty list
    /// on any transport or decode error; feed outages never abort a run.
    async fn latest_posts(&self, account: &str, limit: usize) -> Vec<Post>;
}

/// REST client for the feed scraping service.
pub struct FeedApi {
    client: Client,
    cfg: FeedConfig,
}

#[derive(Debug, Deserialize)]
struct FeedResponse {
    #[serde(default)]
    posts: Vec<FeedPost>,
}

#[derive(Debug, Deserialize)]
struct FeedPost {
    id: String,
    #[serde(default)]
    author: String,
    text: String,
    created_at: String,
    #[serde(default)]
    urls: Vec<String>,
}

impl FeedApi {
    pub fn new(cfg: FeedConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .unwrap_or_default();
        Self { client, cfg }
    }

    async fn fetch(&self, account: &str, limit: usize) -> anyhow::Result<Vec<Post>> {
        let url = format!("{}/accounts/{}/posts", self.cfg.base_url, account);
        let mut request = self
            .client
            .get(&url)
            .query(&[("limit", limit.to_string())]);
        if !self.cfg.bearer_token.is_empty() {
            request = request.bearer_auth(&self.cfg.bearer_token);
        }

        let response: FeedResponse = request
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let posts = response
            .posts
            .into_iter()
            .filter_map(|p| {
                let created_at = p
                    .created_at
                    .parse::<DateTime<Utc>>()
                    .ok()?;
                Some(Post {
                    id: p.id,
                    author: if p.author.is_empty() {
                        account.to_string()
                    } else {
                        p.author
                    },
                    text: p.text,
                    created_at,
                    link: p.urls.into_iter().next(),
                })
            })
            .collect();
        Ok(posts)
    }
}

#[async_trait]
impl PostSource for FeedApi {
    async fn latest_posts(&self, account: &str, limit: usize) -> Vec<Post> {
        match self.fetch(account, limit).await {
            Ok(posts) => {
                info!("fetched {} posts for {}", posts.len(), account);
                posts
            }
            Err(e) => {
                warn!("feed fetch for {} failed: {}", account, e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_post_decodes() {
        let raw = r#"{
            "posts": [
                {"id": "100", "text": "big announcement", "created_at": "2026-08-01T12:00:00Z", "urls": ["https://example.com/a"]},
                {"id": "101", "author": "other", "text": "plain", "created_at": "2026-08-01T13:00:00Z"}
            ]
        }"#;
        let parsed: FeedResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.posts.len(), 2);
        assert_eq!(parsed.posts[0].urls.len(), 1);
        assert!(parsed.posts[1].urls.is_empty());
    }

    #[test]
    fn test_bad_timestamp_is_dropped() {
        let post = FeedPost {
            id: "1".into(),
            author: String::new(),
            text: "t".into(),
            created_at: "not-a-date".into(),
            urls: vec![],
        };
        assert!(post.created_at.parse::<DateTime<Utc>>().is_err());
    }
}
