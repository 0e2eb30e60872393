//! Application configuration.
//!
//! A single immutable `AppConfig` is built once at process start and
//! threaded explicitly into every component. Missing credentials or
//! malformed sections fail `validate()` before any orchestrator runs;
//! this is the only error class that aborts the process.

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    pub feed: FeedConfig,
    pub search: SearchConfig,
    pub llm: LlmConfig,
    pub image: ImageConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub chains: Vec<ChainConfig>,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub grading: GradingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    pub base_url: String,
    pub account: String,
    #[serde(default)]
    pub bearer_token: String,
    #[serde(default = "default_page_limit")]
    pub page_limit: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            account: String::new(),
            bearer_token: String::new(),
            page_limit: default_page_limit(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_tavily_url")]
    pub tavily_url: String,
    #[serde(default)]
    pub tavily_api_key: String,
    #[serde(default = "default_gdelt_url")]
    pub gdelt_url: String,
    #[serde(default = "default_results_per_query")]
    pub results_per_query: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            tavily_url: default_tavily_url(),
            tavily_api_key: String::new(),
            gdelt_url: default_gdelt_url(),
            results_per_query: default_results_per_query(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_rate_limit_rpm")]
    pub rate_limit_rpm: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            api_key: String::new(),
            model: default_llm_model(),
            rate_limit_rpm: default_rate_limit_rpm(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImageConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_image_model")]
    pub model: String,
    #[serde(default = "default_image_size")]
    pub size: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            api_key: String::new(),
            model: default_image_model(),
            size: default_image_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
        }
    }
}

/// One configured chain. `family` routes resolution: "evm" or "other".
#[derive(Debug, Deserialize, Clone)]
pub struct ChainConfig {
    pub id: String,
    pub family: String,
    #[serde(default)]
    pub chain_id: u64,
    #[serde(default)]
    pub rpc_url: String,
    #[serde(default)]
    pub contract_address: String,
    #[serde(default)]
    pub signer_key: String,
    #[serde(default)]
    pub subgraph_url: String,
    /// Non-EVM chains resolve through a bridge service instead of an RPC.
    #[serde(default)]
    pub bridge_url: String,
    #[serde(default)]
    pub bridge_api_key: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    /// Chain new markets are published to.
    #[serde(default)]
    pub chain: String,
    #[serde(default = "default_close_window_hours")]
    pub close_window_hours: i64,
    #[serde(default = "default_query_count")]
    pub query_count: usize,
    #[serde(default = "default_receipt_timeout_secs")]
    pub receipt_timeout_secs: u64,
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            chain: String::new(),
            close_window_hours: default_close_window_hours(),
            query_count: default_query_count(),
            receipt_timeout_secs: default_receipt_timeout_secs(),
            dry_run: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GradingConfig {
    /// Chains whose pending lists are scanned each run.
    #[serde(default)]
    pub chains: Vec<String>,
    /// Per-run cap on pending markets per chain. A rate-limiting policy,
    /// not a correctness bound.
    #[serde(default = "default_pending_batch_size")]
    pub pending_batch_size: usize,
    #[serde(default = "default_queries_per_market")]
    pub queries_per_market: usize,
    #[serde(default = "default_evidence_per_query")]
    pub evidence_per_query: usize,
    #[serde(default = "default_receipt_timeout_secs")]
    pub receipt_timeout_secs: u64,
    #[serde(default = "default_jitter_min_ms")]
    pub write_jitter_min_ms: u64,
    #[serde(default = "default_jitter_max_ms")]
    pub write_jitter_max_ms: u64,
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            chains: Vec::new(),
            pending_batch_size: default_pending_batch_size(),
            queries_per_market: default_queries_per_market(),
            evidence_per_query: default_evidence_per_query(),
            receipt_timeout_secs: default_receipt_timeout_secs(),
            write_jitter_min_ms: default_jitter_min_ms(),
            write_jitter_max_ms: default_jitter_max_ms(),
            dry_run: false,
        }
    }
}

fn default_page_limit() -> usize {
    20
}
fn default_timeout_secs() -> u64 {
    15
}
fn default_tavily_url() -> String {
    "https://api.tavily.com/search".to_string()
}
fn default_gdelt_url() -> String {
    "https://api.gdeltproject.org/api/v2/doc/doc".to_string()
}
fn default_results_per_query() -> usize {
    5
}
fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_rate_limit_rpm() -> u32 {
    60
}
fn default_image_model() -> String {
    "dall-e-3".to_string()
}
fn default_image_size() -> String {
    "1024x1024".to_string()
}
fn default_max_connections() -> u32 {
    5
}
fn default_close_window_hours() -> i64 {
    24
}
fn default_query_count() -> usize {
    3
}
fn default_receipt_timeout_secs() -> u64 {
    75
}
fn default_pending_batch_size() -> usize {
    5
}
fn default_queries_per_market() -> usize {
    3
}
fn default_evidence_per_query() -> usize {
    5
}
fn default_jitter_min_ms() -> u64 {
    100
}
fn default_jitter_max_ms() -> u64 {
    300
}

impl AppConfig {
    pub fn load(path: &str) -> Result<Self> {
        let cfg = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::default().separator("__"))
            .build()
            .context("building config")?;

        let app: AppConfig = cfg.try_deserialize().context("deserializing config")?;
        app.validate()?;
        Ok(app)
    }

    pub fn chain(&self, id: &str) -> Option<&ChainConfig> {
        self.chains.iter().find(|c| c.id == id)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.feed.base_url.is_empty(), "feed.base_url missing");
        anyhow::ensure!(!self.feed.account.is_empty(), "feed.account missing");
        anyhow::ensure!(!self.llm.api_key.is_empty(), "llm.api_key missing");
        anyhow::ensure!(
            !self.search.tavily_api_key.is_empty(),
            "search.tavily_api_key missing"
        );
        anyhow::ensure!(!self.chains.is_empty(), "chains must not be empty");
        for chain in &self.chains {
            match chain.family.as_str() {
                "evm" => {
                    anyhow::ensure!(
                        chain.chain_id > 0,
                        "chains.{}.chain_id missing",
                        chain.id
                    );
                    anyhow::ensure!(
                        !chain.rpc_url.is_empty(),
                        "chains.{}.rpc_url missing",
                        chain.id
                    );
                    anyhow::ensure!(
                        !chain.contract_address.is_empty(),
                        "chains.{}.contract_address missing",
                        chain.id
                    );
                    anyhow::ensure!(
                        !chain.signer_key.is_empty(),
                        "chains.{}.signer_key missing",
                        chain.id
                    );
                }
                "other" => {
                    anyhow::ensure!(
                        !chain.bridge_url.is_empty(),
                        "chains.{}.bridge_url missing",
                        chain.id
                    );
                }
                family => anyhow::bail!("chains.{}.family '{}' not recognized", chain.id, family),
            }
        }
        anyhow::ensure!(
            !self.generation.chain.is_empty(),
            "generation.chain missing"
        );
        anyhow::ensure!(
            self.chain(&self.generation.chain).is_some(),
            "generation.chain '{}' is not configured under chains",
            self.generation.chain
        );
        for id in &self.grading.chains {
            anyhow::ensure!(
                self.chain(id).is_some(),
                "grading chain '{}' is not configured under chains",
                id
            );
        }
        anyhow::ensure!(
            self.grading.pending_batch_size > 0,
            "grading.pending_batch_size must be > 0"
        );
        anyhow::ensure!(
            self.grading.write_jitter_min_ms <= self.grading.write_jitter_max_ms,
            "grading.write_jitter_min_ms must not exceed write_jitter_max_ms"
        );
        anyhow::ensure!(
            self.generation.receipt_timeout_secs > 0 && self.grading.receipt_timeout_secs > 0,
            "receipt_timeout_secs must be > 0"
        );
        if !(self.generation.dry_run && self.grading.dry_run) {
            anyhow::ensure!(!self.database.url.is_empty(), "database.url missing");
        }
        Ok(())
    }
}
