//! End-to-end generation pipeline tests against mock collaborators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;

use common::config::GenerationConfig;
use common::skip;
use common::store::{MarketStore, MemoryStore};
use common::types::{MarketSnapshot, Post, ResultCode, WorkItem};
use connectors::llm::LanguageModel;
use connectors::page::PageReader;
use connectors::websearch::{SearchHit, SearchProvider};
use connectors::ImageGenerator;
use ledger::{LedgerClient, LedgerError, PublishOutcome, PublishRequest};
use market_generation::GenerationPipeline;

struct MockLlm {
    idea: serde_json::Value,
}

impl MockLlm {
    fn new() -> Self {
        Self {
            idea: serde_json::json!({
                "worth_market": true,
                "question": "Will the merger close by Friday"
            }),
        }
    }
}

#[async_trait]
impl LanguageModel for MockLlm {
    async fn complete_json(&self, _system: &str, user: &str) -> Result<serde_json::Value> {
        if user.starts_with("Derive") {
            Ok(serde_json::json!({"queries": ["merger news", "deal close date", "regulator filing"]}))
        } else if user.starts_with("Summarize") {
            Ok(serde_json::json!({"summary": "The linked filing confirms a Friday deadline."}))
        } else {
            Ok(self.idea.clone())
        }
    }
}

struct MockSearch {
    calls: AtomicUsize,
    fail: bool,
}

impl MockSearch {
    fn new(fail: bool) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail,
        }
    }
}

#[async_trait]
impl SearchProvider for MockSearch {
    async fn search(&self, query: &str, _limit: usize) -> Result<Vec<SearchHit>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("search provider down");
        }
        Ok(vec![SearchHit {
            url: format!("https://results.example/{}", query.len()),
            title: "headline".into(),
            snippet: format!("snippet for {}", query),
        }])
    }
}

struct MockPage {
    calls: AtomicUsize,
}

#[async_trait]
impl PageReader for MockPage {
    async fn read(&self, _url: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok("Filing text: deadline is Friday.".into())
    }
}

struct MockImage {
    calls: AtomicUsize,
    fail: bool,
}

#[async_trait]
impl ImageGenerator for MockImage {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("image service down");
        }
        Ok("https://img.example/market.png".into())
    }
}

struct CountingLedger {
    publishes: AtomicUsize,
    fail: bool,
}

impl CountingLedger {
    fn new(fail: bool) -> Self {
        Self {
            publishes: AtomicUsize::new(0),
            fail,
        }
    }
}

#[async_trait]
impl LedgerClient for CountingLedger {
    async fn pending_markets(
        &self,
        _chain: &str,
        _cap: usize,
    ) -> Result<Vec<MarketSnapshot>, LedgerError> {
        Ok(Vec::new())
    }

    async fn publish_market(&self, req: PublishRequest) -> Result<PublishOutcome, LedgerError> {
        self.publishes.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(LedgerError::Call(anyhow::anyhow!("rpc unreachable")));
        }
        assert_eq!(req.options, vec!["Yes".to_string(), "No".to_string()]);
        Ok(PublishOutcome {
            tx_hash: "0xfeed".into(),
            market_id: Some("101".into()),
        })
    }

    async fn resolve_evm(
        &self,
        _chain: &str,
        _market_id: &str,
        _code: ResultCode,
    ) -> Result<String, LedgerError> {
        unreachable!("generation never resolves")
    }

    async fn resolve_other(
        &self,
        _chain: &str,
        _market_id: &str,
        _code: ResultCode,
    ) -> Result<String, LedgerError> {
        unreachable!("generation never resolves")
    }
}

struct Harness {
    pipeline: GenerationPipeline,
    store: Arc<MemoryStore>,
    ledger: Arc<CountingLedger>,
    image: Arc<MockImage>,
    page: Arc<MockPage>,
}

fn harness(ledger_fails: bool, image_fails: bool) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let ledger = Arc::new(CountingLedger::new(ledger_fails));
    let image = Arc::new(MockImage {
        calls: AtomicUsize::new(0),
        fail: image_fails,
    });
    let page = Arc::new(MockPage {
        calls: AtomicUsize::new(0),
    });

    let cfg = GenerationConfig {
        chain: "bsc".into(),
        close_window_hours: 24,
        query_count: 3,
        receipt_timeout_secs: 75,
        dry_run: false,
    };

    let pipeline = GenerationPipeline::new(
        cfg,
        3,
        Arc::new(MockLlm::new()),
        Arc::new(MockSearch::new(false)),
        Arc::new(MockSearch::new(false)),
        page.clone(),
        image.clone(),
        ledger.clone(),
        store.clone(),
    );

    Harness {
        pipeline,
        store,
        ledger,
        image,
        page,
    }
}

fn post(id: &str, text: &str, link: Option<&str>) -> Post {
    Post {
        id: id.into(),
        author: "oracle".into(),
        text: text.into(),
        created_at: Utc::now(),
        link: link.map(String::from),
    }
}

#[tokio::test]
async fn test_scenario_a_full_pipeline() {
    let h = harness(false, false);
    let report = h
        .pipeline
        .run_batch(vec![post("p1", "Merger vote scheduled this week", None)])
        .await;

    assert_eq!(report.items.len(), 1);
    let item = &report.items[0];
    assert!(item.question.as_deref().unwrap().ends_with('?'));
    assert_eq!(item.image_url.as_deref(), Some("https://img.example/market.png"));
    assert_eq!(item.transaction_hash.as_deref(), Some("0xfeed"));
    assert_eq!(item.market_id.as_deref(), Some("101"));
    assert_eq!(h.ledger.publishes.load(Ordering::SeqCst), 1);

    let stored = h.store.load_work_item("p1").await.unwrap().unwrap();
    assert_eq!(stored.market_id.as_deref(), Some("101"));
}

#[tokio::test]
async fn test_idempotency_published_item_is_never_republished() {
    let h = harness(false, false);

    let mut prior = WorkItem::new(post("p1", "already handled", None));
    prior.transaction_hash = Some("0xold".into());
    prior.market_id = Some("7".into());
    h.store.upsert_work_item(&prior).await.unwrap();

    let report = h
        .pipeline
        .run_batch(vec![post("p1", "already handled", None)])
        .await;

    assert_eq!(h.ledger.publishes.load(Ordering::SeqCst), 0);
    assert_eq!(h.image.calls.load(Ordering::SeqCst), 0);
    let item = &report.items[0];
    assert_eq!(item.transaction_hash.as_deref(), Some("0xold"));
    assert_eq!(item.market_id.as_deref(), Some("7"));
}

#[tokio::test]
async fn test_scenario_b_filtered_item_output_equals_input() {
    let h = harness(false, false);

    let mut prior = WorkItem::new(post("p1", "filtered before", None));
    prior.skip(skip::FILTERED);
    h.store.upsert_work_item(&prior).await.unwrap();

    let report = h
        .pipeline
        .run_batch(vec![post("p1", "filtered before", None)])
        .await;

    let item = &report.items[0];
    assert!(!item.should_process);
    assert_eq!(item.skip_reason.as_deref(), Some(skip::FILTERED));
    assert!(item.question.is_none());
    assert!(item.evidence.is_empty());
    assert_eq!(h.ledger.publishes.load(Ordering::SeqCst), 0);
    assert_eq!(h.image.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_publish_failure_marks_item_and_batch_continues() {
    let h = harness(true, false);
    let report = h
        .pipeline
        .run_batch(vec![
            post("p1", "first post", None),
            post("p2", "second post", None),
        ])
        .await;

    assert_eq!(report.items.len(), 2);
    for item in &report.items {
        assert!(!item.should_process);
        assert_eq!(item.skip_reason.as_deref(), Some(skip::FAILED_POOL_CREATION));
        assert!(item.transaction_hash.is_none());
    }
    // Both items reached the publisher despite the first failure.
    assert_eq!(h.ledger.publishes.load(Ordering::SeqCst), 2);
    // Failure state was still persisted.
    assert!(h.store.load_work_item("p2").await.unwrap().is_some());
}

#[tokio::test]
async fn test_image_failure_skips_publish() {
    let h = harness(false, true);
    let report = h
        .pipeline
        .run_batch(vec![post("p1", "some post", None)])
        .await;

    let item = &report.items[0];
    assert_eq!(item.skip_reason.as_deref(), Some(skip::FAILED_IMAGE));
    assert_eq!(h.ledger.publishes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_external_link_branch_collects_page_evidence() {
    let h = harness(false, false);
    let report = h
        .pipeline
        .run_batch(vec![post(
            "p1",
            "big filing dropped",
            Some("https://sec.example/filing"),
        )])
        .await;

    assert_eq!(h.page.calls.load(Ordering::SeqCst), 1);
    let item = &report.items[0];
    assert!(item
        .evidence
        .iter()
        .any(|e| e.search_query == "external_link"));
}
