use std::sync::Arc;

use anyhow::Result;
use tracing::{info, Level};

use common::config::AppConfig;
use common::store::{MarketStore, MemoryStore, PostgresStore};
use connectors::{FeedApi, GdeltNews, HttpPageReader, ImageApi, OpenAiModel, PostSource, TavilyClient};
use ledger::ChainLedger;
use market_generation::GenerationPipeline;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    let cfg = AppConfig::load(&config_path)?;

    info!("🚀 starting market generation run");

    let store: Arc<dyn MarketStore> = if cfg.generation.dry_run {
        info!("dry run: using in-memory store, skipping ledger writes");
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(PostgresStore::connect(&cfg.database).await?)
    };

    let chain_ledger = ChainLedger::from_config(&cfg.chains, cfg.generation.receipt_timeout_secs)?;
    let pipeline = GenerationPipeline::new(
        cfg.generation.clone(),
        cfg.search.results_per_query,
        Arc::new(OpenAiModel::new(cfg.llm.clone())),
        Arc::new(GdeltNews::new(&cfg.search)),
        Arc::new(TavilyClient::new(&cfg.search)),
        Arc::new(HttpPageReader::new(cfg.search.timeout_secs, 6000)),
        Arc::new(ImageApi::new(cfg.image.clone())),
        Arc::new(chain_ledger),
        store,
    );

    let feed = FeedApi::new(cfg.feed.clone());
    let posts = feed
        .latest_posts(&cfg.feed.account, cfg.feed.page_limit)
        .await;

    let report = pipeline.run_batch(posts).await;
    report.log_summary();

    Ok(())
}
