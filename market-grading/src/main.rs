use std::sync::Arc;

use anyhow::Result;
use tracing::{info, Level};

use common::config::AppConfig;
use common::store::{MarketStore, MemoryStore, PostgresStore};
use connectors::{OpenAiModel, TavilyClient};
use ledger::{ChainLedger, ChainRegistry};
use market_grading::GradingPipeline;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    let cfg = AppConfig::load(&config_path)?;

    info!("🚀 starting market grading run");

    let store: Arc<dyn MarketStore> = if cfg.grading.dry_run {
        info!("dry run: using in-memory store, skipping ledger writes");
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(PostgresStore::connect(&cfg.database).await?)
    };

    let chain_ledger = ChainLedger::from_config(&cfg.chains, cfg.grading.receipt_timeout_secs)?;
    let registry = ChainRegistry::from_chains(&cfg.chains);

    let pipeline = GradingPipeline::new(
        cfg.grading.clone(),
        Arc::new(OpenAiModel::new(cfg.llm.clone())),
        Arc::new(TavilyClient::new(&cfg.search)),
        Arc::new(chain_ledger),
        registry,
        store,
    );

    let report = pipeline.run().await;
    report.log_summary();

    Ok(())
}
