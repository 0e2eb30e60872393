//! Generation stages.
//!
//! Every stage catches its own collaborator errors: a failure marks the
//! item with a reason and the batch moves on. No stage retries.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use common::config::GenerationConfig;
use common::skip;
use common::store::MarketStore;
use common::types::{Evidence, WorkItem};
use connectors::llm::{structured, LanguageModel};
use connectors::page::PageReader;
use connectors::websearch::SearchProvider;
use connectors::ImageGenerator;
use ledger::{LedgerClient, PublishRequest};

use crate::state::external_link;

const RESEARCH_SYSTEM: &str =
    "You are a research assistant for a prediction market desk. Reply with a single JSON object and nothing else.";
const IDEA_SYSTEM: &str =
    "You turn social posts into tradeable yes/no prediction market questions. Reply with a single JSON object and nothing else.";

#[derive(Debug, Deserialize)]
struct QueryList {
    #[serde(default)]
    queries: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PageSummary {
    #[serde(default)]
    summary: String,
}

#[derive(Debug, Deserialize)]
struct IdeaResponse {
    #[serde(default)]
    worth_market: bool,
    #[serde(default)]
    question: Option<String>,
}

pub struct GenerationPipeline {
    pub(crate) cfg: GenerationConfig,
    pub(crate) results_per_query: usize,
    pub(crate) llm: Arc<dyn LanguageModel>,
    pub(crate) news: Arc<dyn SearchProvider>,
    pub(crate) web: Arc<dyn SearchProvider>,
    pub(crate) page: Arc<dyn PageReader>,
    pub(crate) image: Arc<dyn ImageGenerator>,
    pub(crate) ledger: Arc<dyn LedgerClient>,
    pub(crate) store: Arc<dyn MarketStore>,
}

impl GenerationPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cfg: GenerationConfig,
        results_per_query: usize,
        llm: Arc<dyn LanguageModel>,
        news: Arc<dyn SearchProvider>,
        web: Arc<dyn SearchProvider>,
        page: Arc<dyn PageReader>,
        image: Arc<dyn ImageGenerator>,
        ledger: Arc<dyn LedgerClient>,
        store: Arc<dyn MarketStore>,
    ) -> Self {
        Self {
            cfg,
            results_per_query,
            llm,
            news,
            web,
            page,
            image,
            ledger,
            store,
        }
    }

    pub(crate) async fn extract_queries(&self, item: &mut WorkItem) {
        let user = format!(
            "Derive web search queries for researching the post below.\n\n\
             Post by @{} at {}:\n{}\n\n\
             Reply as {{\"queries\": [...]}} with exactly {} short queries.",
            item.post.author, item.post.created_at, item.post.text, self.cfg.query_count
        );

        match structured::<QueryList>(self.llm.as_ref(), RESEARCH_SYSTEM, &user).await {
            Ok(list) if !list.queries.is_empty() => {
                item.search_queries = list
                    .queries
                    .into_iter()
                    .take(self.cfg.query_count)
                    .collect();
            }
            Ok(_) => {
                warn!("no queries derived for post {}", item.post.id);
                item.skip(skip::FAILED_QUERY_EXTRACTION);
            }
            Err(e) => {
                warn!("query extraction for post {} failed: {}", item.post.id, e);
                item.skip(skip::FAILED_QUERY_EXTRACTION);
            }
        }
    }

    /// Fetch and summarize the page a post links to. The branch is only
    /// entered when a link exists; a fetch or summary failure degrades
    /// to no extra evidence.
    pub(crate) async fn check_external_link(&self, item: &mut WorkItem) {
        let Some(link) = external_link(&item.post) else {
            return;
        };

        let text = match self.page.read(&link).await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => {
                debug!("linked page {} had no visible text", link);
                return;
            }
            Err(e) => {
                warn!("fetching linked page {} failed: {}", link, e);
                return;
            }
        };

        let user = format!(
            "Summarize the page content below as it relates to this post.\n\n\
             Post:\n{}\n\nPage content:\n{}\n\n\
             Reply as {{\"summary\": \"...\"}} in at most three sentences.",
            item.post.text, text
        );
        match structured::<PageSummary>(self.llm.as_ref(), RESEARCH_SYSTEM, &user).await {
            Ok(page) if !page.summary.is_empty() => item.evidence.push(Evidence {
                url: link,
                summary: page.summary,
                search_query: "external_link".to_string(),
            }),
            Ok(_) => {}
            Err(e) => warn!("summarizing linked page {} failed: {}", link, e),
        }
    }

    pub(crate) async fn news_search(&self, item: &mut WorkItem) {
        self.collect_evidence(item, self.news.as_ref()).await;
    }

    pub(crate) async fn web_search(&self, item: &mut WorkItem) {
        self.collect_evidence(item, self.web.as_ref()).await;
    }

    /// One provider pass over the item's queries. Individual query
    /// failures drop that query's results, nothing else.
    async fn collect_evidence(&self, item: &mut WorkItem, provider: &dyn SearchProvider) {
        for query in item.search_queries.clone() {
            match provider.search(&query, self.results_per_query).await {
                Ok(hits) => {
                    for hit in hits {
                        item.evidence.push(Evidence {
                            url: hit.url,
                            summary: format!("{}: {}", hit.title, hit.snippet),
                            search_query: query.clone(),
                        });
                    }
                }
                Err(e) => warn!("search '{}' failed: {}", query, e),
            }
        }
    }

    pub(crate) async fn synthesize_idea(&self, item: &mut WorkItem) {
        let digest = evidence_digest(&item.evidence);
        let user = format!(
            "Propose a prediction market based on the post and research below.\n\n\
             Post by @{}:\n{}\n\nResearch:\n{}\n\n\
             The market must be a single yes/no question about a concrete, \
             publicly verifiable outcome within the next few days. \
             Reply as {{\"worth_market\": true|false, \"question\": \"...\"}}; \
             set worth_market to false when the post does not support one.",
            item.post.author, item.post.text, digest
        );

        match structured::<IdeaResponse>(self.llm.as_ref(), IDEA_SYSTEM, &user).await {
            Ok(idea) => {
                let question = idea.question.unwrap_or_default();
                if idea.worth_market && !question.is_empty() {
                    item.question = Some(normalize_question(&question));
                } else {
                    debug!("post {} not worth a market", item.post.id);
                    item.skip(skip::NO_QUESTION);
                }
            }
            Err(e) => {
                warn!("idea synthesis for post {} failed: {}", item.post.id, e);
                item.skip(skip::NO_QUESTION);
            }
        }
    }

    pub(crate) async fn generate_image(&self, item: &mut WorkItem) {
        let Some(question) = item.question.clone() else {
            item.skip(skip::NO_QUESTION);
            return;
        };

        let prompt = format!(
            "Minimalist editorial illustration for a prediction market asking: {} \
             Flat colors, no text in the image.",
            question
        );
        match self.image.generate(&prompt).await {
            Ok(url) => item.image_url = Some(url),
            Err(e) => {
                warn!("image generation for post {} failed: {}", item.post.id, e);
                item.skip(skip::FAILED_IMAGE);
            }
        }
    }

    pub(crate) async fn publish_market(&self, item: &mut WorkItem) {
        let Some(question) = item.question.clone() else {
            item.skip(skip::NO_QUESTION);
            return;
        };
        if self.cfg.dry_run {
            item.skip(skip::DRY_RUN);
            return;
        }

        let close_time = Utc::now() + Duration::hours(self.cfg.close_window_hours);
        let request = PublishRequest {
            chain: self.cfg.chain.clone(),
            question,
            options: vec!["Yes".to_string(), "No".to_string()],
            close_time,
        };

        match self.ledger.publish_market(request).await {
            Ok(outcome) => {
                item.transaction_hash = Some(outcome.tx_hash);
                item.market_id = outcome.market_id;
            }
            Err(e) => {
                warn!("publish for post {} failed: {}", item.post.id, e);
                item.skip(skip::FAILED_POOL_CREATION);
            }
        }
    }

    pub(crate) async fn persist(&self, item: &WorkItem) {
        if let Err(e) = self.store.upsert_work_item(item).await {
            warn!("persisting post {} failed: {}", item.post.id, e);
        }
    }
}

fn evidence_digest(evidence: &[Evidence]) -> String {
    if evidence.is_empty() {
        return "(no research collected)".to_string();
    }
    evidence
        .iter()
        .map(|e| format!("- {} ({})", e.summary, e.url))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Whitespace-normalize a synthesized question and make it end in `?`.
pub fn normalize_question(raw: &str) -> String {
    let mut question = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    while question.ends_with(['.', '!', '?', ' ']) {
        question.pop();
    }
    question.push('?');
    question
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_question_appends_mark() {
        assert_eq!(normalize_question("Will BTC close above 100k"), "Will BTC close above 100k?");
    }

    #[test]
    fn test_normalize_question_collapses_whitespace_and_punctuation() {
        assert_eq!(
            normalize_question("  Will it\n happen?! "),
            "Will it happen?"
        );
    }

    #[test]
    fn test_evidence_digest_lists_entries() {
        let digest = evidence_digest(&[Evidence {
            url: "https://a".into(),
            summary: "headline".into(),
            search_query: "q".into(),
        }]);
        assert!(digest.contains("headline"));
        assert!(digest.contains("https://a"));
    }
}
