//! Bridge service client for non-EVM chains.
//!
//! Chains without a native Rust signer resolve through a small REST
//! bridge that holds the chain-side keys and submits on our behalf.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

use common::config::ChainConfig;
use common::types::ResultCode;

use crate::client::{LedgerError, PublishOutcome};

pub struct BridgeLedger {
    http: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct BridgeTxResponse {
    tx_hash: String,
    #[serde(default)]
    market_id: Option<String>,
}

impl BridgeLedger {
    pub fn new(cfg: &ChainConfig) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: cfg.bridge_url.clone(),
            api_key: cfg.bridge_api_key.clone(),
        }
    }

    pub async fn publish(
        &self,
        question: &str,
        options: &[String],
        close_time: DateTime<Utc>,
    ) -> Result<PublishOutcome, LedgerError> {
        let url = format!("{}/markets", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "question": question,
                "options": options,
                "close_time": close_time.timestamp(),
            }))
            .send()
            .await
            .map_err(|e| LedgerError::Call(anyhow::anyhow!(e)))?
            .error_for_status()
            .map_err(|e| LedgerError::Call(anyhow::anyhow!(e)))?
            .json::<BridgeTxResponse>()
            .await
            .map_err(|e| LedgerError::Call(anyhow::anyhow!(e)))?;

        Ok(PublishOutcome {
            tx_hash: response.tx_hash,
            market_id: response.market_id,
        })
    }

    pub async fn resolve(
        &self,
        market_id: &str,
        code: ResultCode,
    ) -> Result<String, LedgerError> {
        let url = format!("{}/resolutions", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "market_id": market_id,
                "result": code.as_u8(),
            }))
            .send()
            .await
            .map_err(|e| LedgerError::Call(anyhow::anyhow!(e)))?
            .error_for_status()
            .map_err(|e| LedgerError::Call(anyhow::anyhow!(e)))?
            .json::<BridgeTxResponse>()
            .await
            .map_err(|e| LedgerError::Call(anyhow::anyhow!(e)))?;

        Ok(response.tx_hash)
    }
}
