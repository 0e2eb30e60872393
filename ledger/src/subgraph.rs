//! Subgraph read index.
//!
//! Pending markets come from the chain's subgraph, never from local
//! state: each run re-derives its workset, and the index excludes
//! markets that already resolved.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

use common::types::MarketSnapshot;

use crate::client::LedgerError;

const PENDING_QUERY: &str = r#"
query PendingPools($first: Int!) {
  pools(first: $first, where: { status: "pending" }, orderBy: closeTime, orderDirection: asc) {
    id
    question
    options
    closeTime
    criteria
  }
}
"#;

pub struct SubgraphClient {
    http: Client,
    url: String,
    chain: String,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<PendingData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct PendingData {
    #[serde(default)]
    pools: Vec<PoolRow>,
}

#[derive(Debug, Deserialize)]
struct PoolRow {
    id: String,
    question: String,
    #[serde(default)]
    options: Vec<String>,
    #[serde(rename = "closeTime")]
    close_time: String,
    #[serde(default)]
    criteria: String,
}

impl SubgraphClient {
    pub fn new(url: &str, chain: String) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .unwrap_or_default();
        Self {
            http,
            url: url.to_string(),
            chain,
        }
    }

    pub async fn pending_markets(&self, cap: usize) -> Result<Vec<MarketSnapshot>, LedgerError> {
        let response = self
            .http
            .post(&self.url)
            .json(&serde_json::json!({
                "query": PENDING_QUERY,
                "variables": { "first": cap },
            }))
            .send()
            .await
            .map_err(|e| LedgerError::Call(anyhow::anyhow!(e)))?
            .error_for_status()
            .map_err(|e| LedgerError::Call(anyhow::anyhow!(e)))?
            .json::<GraphQlResponse>()
            .await
            .map_err(|e| LedgerError::Call(anyhow::anyhow!(e)))?;

        if !response.errors.is_empty() {
            let messages: Vec<&str> = response.errors.iter().map(|e| e.message.as_str()).collect();
            return Err(LedgerError::Call(anyhow::anyhow!(
                "subgraph query failed: {}",
                messages.join("; ")
            )));
        }

        let pools = response.data.map(|d| d.pools).unwrap_or_default();
        let mut markets = Vec::with_capacity(pools.len());
        for pool in pools {
            match snapshot_from_row(pool, &self.chain) {
                Some(market) => markets.push(market),
                None => warn!("dropping pending pool with malformed close time"),
            }
        }
        Ok(markets)
    }
}

fn snapshot_from_row(pool: PoolRow, chain: &str) -> Option<MarketSnapshot> {
    let close_time = parse_epoch(&pool.close_time)?;
    Some(MarketSnapshot {
        market_id: pool.id,
        question: pool.question,
        options: if pool.options.is_empty() {
            vec!["Yes".to_string(), "No".to_string()]
        } else {
            pool.options
        },
        close_time,
        closure_criteria: pool.criteria,
        chain: chain.to_string(),
    })
}

fn parse_epoch(raw: &str) -> Option<DateTime<Utc>> {
    let seconds = raw.parse::<i64>().ok()?;
    Utc.timestamp_opt(seconds, 0).single()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_response_decodes() {
        let raw = r#"{
            "data": {
                "pools": [
                    {"id": "12", "question": "Will X pass?", "options": ["Yes", "No"], "closeTime": "1754600000", "criteria": "official vote record"}
                ]
            }
        }"#;
        let parsed: GraphQlResponse = serde_json::from_str(raw).unwrap();
        let pools = parsed.data.unwrap().pools;
        assert_eq!(pools.len(), 1);

        let snapshot = snapshot_from_row(pools.into_iter().next().unwrap(), "bsc").unwrap();
        assert_eq!(snapshot.market_id, "12");
        assert_eq!(snapshot.chain, "bsc");
        assert_eq!(snapshot.close_time.timestamp(), 1754600000);
    }

    #[test]
    fn test_malformed_close_time_is_dropped() {
        let row = PoolRow {
            id: "1".into(),
            question: "q?".into(),
            options: vec![],
            close_time: "soon".into(),
            criteria: String::new(),
        };
        assert!(snapshot_from_row(row, "bsc").is_none());
    }

    #[test]
    fn test_graphql_errors_surface() {
        let raw = r#"{"errors": [{"message": "rate limited"}]}"#;
        let parsed: GraphQlResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.errors.len(), 1);
    }
}
