//! Image generator.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use common::config::ImageConfig;

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generate one illustration and return its URL.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Client for an OpenAI-compatible images endpoint.
pub struct ImageApi {
    http: Client,
    cfg: ImageConfig,
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    #[serde(default)]
    url: Option<String>,
}

impl ImageApi {
    pub fn new(cfg: ImageConfig) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .unwrap_or_default();
        Self { http, cfg }
    }
}

#[async_trait]
impl ImageGenerator for ImageApi {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/images/generations", self.cfg.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.cfg.api_key)
            .json(&serde_json::json!({
                "model": self.cfg.model,
                "prompt": prompt,
                "n": 1,
                "size": self.cfg.size,
                "response_format": "url",
            }))
            .send()
            .await?
            .error_for_status()?
            .json::<ImagesResponse>()
            .await?;

        response
            .data
            .into_iter()
            .next()
            .and_then(|d| d.url)
            .context("image response carried no url")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_images_response_decodes() {
        let raw = r#"{"created": 1, "data": [{"url": "https://img.example/x.png"}]}"#;
        let parsed: ImagesResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.data[0].url.as_deref(), Some("https://img.example/x.png"));
    }

    #[test]
    fn test_empty_data_yields_none() {
        let parsed: ImagesResponse = serde_json::from_str(r#"{"data": []}"#).unwrap();
        assert!(parsed.data.into_iter().next().is_none());
    }
}
