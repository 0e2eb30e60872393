//! Core domain types shared by the generation and grading pipelines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One post observed on the social feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub author: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    /// Attached link, when the feed surfaced one alongside the text.
    #[serde(default)]
    pub link: Option<String>,
}

/// A single collected evidence snippet. Additive only; never mutated
/// after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub url: String,
    pub summary: String,
    pub search_query: String,
}

/// One source post moving through the generation pipeline, together with
/// everything accumulated while turning it into a market.
///
/// Stages only add fields or flip `should_process` to false with a
/// reason. Once `transaction_hash` or `market_id` is set the item is
/// terminal-success and must never reach the publisher again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub post: Post,
    #[serde(default)]
    pub search_queries: Vec<String>,
    #[serde(default)]
    pub evidence: Vec<Evidence>,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub transaction_hash: Option<String>,
    #[serde(default)]
    pub market_id: Option<String>,
    pub should_process: bool,
    #[serde(default)]
    pub skip_reason: Option<String>,
}

impl WorkItem {
    pub fn new(post: Post) -> Self {
        Self {
            post,
            search_queries: Vec::new(),
            evidence: Vec::new(),
            question: None,
            image_url: None,
            transaction_hash: None,
            market_id: None,
            should_process: true,
            skip_reason: None,
        }
    }

    /// A ledger identifier is already recorded for this item.
    pub fn is_published(&self) -> bool {
        has_value(&self.transaction_hash) || has_value(&self.market_id)
    }

    /// Flip the item to terminal-failed with a reason. Terminal once
    /// false within a run.
    pub fn skip(&mut self, reason: &str) {
        self.should_process = false;
        self.skip_reason = Some(reason.to_string());
    }
}

/// A market read from the ledger's index. Immutable within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub market_id: String,
    pub question: String,
    pub options: Vec<String>,
    pub close_time: DateTime<Utc>,
    #[serde(default)]
    pub closure_criteria: String,
    pub chain: String,
}

/// Closed, ordered result-code space for a graded market.
///
/// Only `OptionA`, `OptionB` and `Push` may trigger a ledger write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultCode {
    NotReady,
    OptionA,
    OptionB,
    Push,
    Error,
}

impl ResultCode {
    pub fn as_u8(self) -> u8 {
        match self {
            ResultCode::NotReady => 0,
            ResultCode::OptionA => 1,
            ResultCode::OptionB => 2,
            ResultCode::Push => 3,
            ResultCode::Error => 4,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(ResultCode::NotReady),
            1 => Some(ResultCode::OptionA),
            2 => Some(ResultCode::OptionB),
            3 => Some(ResultCode::Push),
            4 => Some(ResultCode::Error),
            _ => None,
        }
    }

    /// Whether this code is allowed to reach the resolution submitter.
    pub fn is_writable(self) -> bool {
        matches!(
            self,
            ResultCode::OptionA | ResultCode::OptionB | ResultCode::Push
        )
    }
}

/// Graded outcome for one market.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub code: ResultCode,
    pub label: String,
    /// Per-option probabilities, aligned with the market's option list.
    #[serde(default)]
    pub probabilities: Vec<f64>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub explanation: String,
}

/// Which resolution path a market's chain routes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainFamily {
    Evm,
    Other,
}

/// One on-chain market awaiting a verdict, plus everything accumulated
/// while grading it. Created fresh each run from the ledger's pending
/// list and discarded at end of run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingResolution {
    pub market: MarketSnapshot,
    #[serde(default)]
    pub search_queries: Vec<String>,
    #[serde(default)]
    pub evidence: Vec<Evidence>,
    #[serde(default)]
    pub verdict: Option<Verdict>,
    #[serde(default)]
    pub chain_family: Option<ChainFamily>,
    pub contract_updated: bool,
    #[serde(default)]
    pub tx_hash: Option<String>,
    pub failed: bool,
    #[serde(default)]
    pub fail_reason: Option<String>,
}

impl PendingResolution {
    pub fn new(market: MarketSnapshot) -> Self {
        Self {
            market,
            search_queries: Vec::new(),
            evidence: Vec::new(),
            verdict: None,
            chain_family: None,
            contract_updated: false,
            tx_hash: None,
            failed: false,
            fail_reason: None,
        }
    }

    /// Mark the record failed. Terminal once true within a run; later
    /// stages skip it without aborting the batch.
    pub fn fail(&mut self, reason: &str) {
        self.failed = true;
        self.fail_reason = Some(reason.to_string());
    }
}

pub(crate) fn has_value(field: &Option<String>) -> bool {
    field.as_deref().map(|s| !s.is_empty()).unwrap_or(false)
}
