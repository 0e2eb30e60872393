//! Grading stages.
//!
//! Failures stay local to one record: a stage that cannot complete
//! marks the record failed and the rest of the batch proceeds.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info, warn};

use common::config::GradingConfig;
use common::skip;
use common::store::MarketStore;
use common::types::{ChainFamily, Evidence, PendingResolution, ResultCode, Verdict};
use connectors::llm::{structured, LanguageModel};
use connectors::websearch::{SearchHit, SearchProvider};
use ledger::{ChainRegistry, LedgerClient};

const VERIFICATION_SYSTEM: &str =
    "You verify prediction market outcomes from collected evidence. Reply with a single JSON object and nothing else.";

#[derive(Debug, Deserialize)]
struct QueryList {
    #[serde(default)]
    queries: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DocSummary {
    #[serde(default)]
    relevant: bool,
    #[serde(default)]
    summary: String,
}

#[derive(Debug, Deserialize)]
struct GradeResponse {
    result: String,
    #[serde(default)]
    probabilities: Vec<f64>,
    #[serde(default)]
    sources: Vec<String>,
    #[serde(default)]
    explanation: String,
}

pub struct GradingPipeline {
    pub(crate) cfg: GradingConfig,
    pub(crate) llm: Arc<dyn LanguageModel>,
    pub(crate) search: Arc<dyn SearchProvider>,
    pub(crate) ledger: Arc<dyn LedgerClient>,
    pub(crate) registry: ChainRegistry,
    pub(crate) store: Arc<dyn MarketStore>,
}

impl GradingPipeline {
    pub fn new(
        cfg: GradingConfig,
        llm: Arc<dyn LanguageModel>,
        search: Arc<dyn SearchProvider>,
        ledger: Arc<dyn LedgerClient>,
        registry: ChainRegistry,
        store: Arc<dyn MarketStore>,
    ) -> Self {
        Self {
            cfg,
            llm,
            search,
            ledger,
            registry,
            store,
        }
    }

    pub(crate) async fn generate_queries(&self, rec: &mut PendingResolution) {
        let user = format!(
            "Derive verification search queries for the market below.\n\n\
             Question: {}\nOptions: {}\nClosure criteria: {}\n\n\
             Reply as {{\"queries\": [...]}} with exactly {} queries that would \
             surface official or authoritative coverage of the outcome.",
            rec.market.question,
            rec.market.options.join(" / "),
            rec.market.closure_criteria,
            self.cfg.queries_per_market
        );

        match structured::<QueryList>(self.llm.as_ref(), VERIFICATION_SYSTEM, &user).await {
            Ok(list) if !list.queries.is_empty() => {
                rec.search_queries = list
                    .queries
                    .into_iter()
                    .take(self.cfg.queries_per_market)
                    .collect();
            }
            Ok(_) => {
                warn!("no verification queries for market {}", rec.market.market_id);
                rec.fail(skip::FAILED_QUERY_GENERATION);
            }
            Err(e) => {
                warn!(
                    "query generation for market {} failed: {}",
                    rec.market.market_id, e
                );
                rec.fail(skip::FAILED_QUERY_GENERATION);
            }
        }
    }

    /// Collect and summarize evidence. Query and document failures are
    /// dropped individually; the stage keeps whatever it managed to
    /// gather, and only a completely empty evidence set fails the record.
    pub(crate) async fn gather_evidence(&self, rec: &mut PendingResolution) {
        for query in rec.search_queries.clone() {
            let hits = match self.search.search(&query, self.cfg.evidence_per_query).await {
                Ok(hits) => hits,
                Err(e) => {
                    warn!("verification search '{}' failed: {}", query, e);
                    continue;
                }
            };

            for hit in hits {
                match self.summarize_document(rec, &hit).await {
                    Ok(Some(summary)) => rec.evidence.push(Evidence {
                        url: hit.url.clone(),
                        summary,
                        search_query: query.clone(),
                    }),
                    Ok(None) => debug!("dropping irrelevant source {}", hit.url),
                    Err(e) => warn!("summarizing {} failed: {}", hit.url, e),
                }
            }
        }

        if rec.evidence.is_empty() {
            warn!("no evidence collected for market {}", rec.market.market_id);
            rec.fail(skip::NO_EVIDENCE);
        }
    }

    async fn summarize_document(
        &self,
        rec: &PendingResolution,
        hit: &SearchHit,
    ) -> anyhow::Result<Option<String>> {
        let user = format!(
            "Summarize the source below as it bears on the market question.\n\n\
             Question: {}\nSource title: {}\nSource content: {}\n\n\
             Reply as {{\"relevant\": true|false, \"summary\": \"...\"}}.",
            rec.market.question, hit.title, hit.snippet
        );
        let doc = structured::<DocSummary>(self.llm.as_ref(), VERIFICATION_SYSTEM, &user).await?;
        Ok((doc.relevant && !doc.summary.is_empty()).then_some(doc.summary))
    }

    pub(crate) async fn grade(&self, rec: &mut PendingResolution) {
        let digest = rec
            .evidence
            .iter()
            .map(|e| format!("- [{}] {} ({})", e.search_query, e.summary, e.url))
            .collect::<Vec<_>>()
            .join("\n");

        let user = format!(
            "Decide the outcome of the market below from the evidence.\n\n\
             Question: {}\nOptions: {}\nCloses: {}\nClosure criteria: {}\n\n\
             Evidence:\n{}\n\n\
             Policy, applied in order: \
             (1) identify the literal time period the question refers to; \
             (2) if that period has not elapsed, answer not_ready regardless of the evidence; \
             (3) if it has elapsed, answer option_a or option_b only when official or \
             clearly corroborating evidence exists, otherwise not_ready; \
             (4) answer push only when the evidence affirmatively shows neither option holds.\n\
             Reply as {{\"result\": \"not_ready|option_a|option_b|push\", \
             \"probabilities\": [p_a, p_b], \"sources\": [urls], \"explanation\": \"...\"}}.",
            rec.market.question,
            rec.market.options.join(" / "),
            rec.market.close_time,
            rec.market.closure_criteria,
            digest
        );

        let response =
            match structured::<GradeResponse>(self.llm.as_ref(), VERIFICATION_SYSTEM, &user).await {
                Ok(response) => response,
                Err(e) => {
                    warn!("grading market {} failed: {}", rec.market.market_id, e);
                    rec.fail(skip::FAILED_GRADING);
                    return;
                }
            };

        let mut code = match response.result.as_str() {
            "not_ready" => ResultCode::NotReady,
            "option_a" => ResultCode::OptionA,
            "option_b" => ResultCode::OptionB,
            "push" => ResultCode::Push,
            other => {
                warn!(
                    "market {} graded with unrecognized result '{}'",
                    rec.market.market_id, other
                );
                ResultCode::Error
            }
        };

        // Rule 2, machine-checked: a market whose close time is still in
        // the future cannot carry a writable verdict.
        if code.is_writable() && rec.market.close_time > Utc::now() {
            warn!(
                "market {} has not closed yet; downgrading {:?} to not-ready",
                rec.market.market_id, code
            );
            code = ResultCode::NotReady;
        }

        rec.verdict = Some(Verdict {
            code,
            label: code_label(code, &rec.market.options),
            probabilities: response.probabilities,
            sources: response.sources,
            explanation: response.explanation,
        });
    }

    pub(crate) fn choose_chain(&self, rec: &mut PendingResolution) {
        match self.registry.family(&rec.market.chain) {
            Some(family) => rec.chain_family = Some(family),
            None => {
                warn!(
                    "market {} sits on unrecognized chain '{}'",
                    rec.market.market_id, rec.market.chain
                );
                rec.fail(skip::UNKNOWN_CHAIN);
            }
        }
    }

    /// Submit the verdict. The skip checks run against this run's
    /// fetched state, so a record that already wrote never reaches the
    /// ledger again.
    pub(crate) async fn resolve(&self, rec: &mut PendingResolution, family: ChainFamily) {
        if rec.failed || rec.contract_updated {
            return;
        }
        let Some(verdict) = rec.verdict.clone() else {
            return;
        };
        if !verdict.code.is_writable() {
            return;
        }
        if self.cfg.dry_run {
            info!(
                "dry run: would resolve market {} as {:?}",
                rec.market.market_id, verdict.code
            );
            return;
        }

        let result = match family {
            ChainFamily::Evm => {
                self.ledger
                    .resolve_evm(&rec.market.chain, &rec.market.market_id, verdict.code)
                    .await
            }
            ChainFamily::Other => {
                self.ledger
                    .resolve_other(&rec.market.chain, &rec.market.market_id, verdict.code)
                    .await
            }
        };

        match result {
            Ok(tx_hash) => {
                info!(
                    "resolved market {} as {:?} in {}",
                    rec.market.market_id, verdict.code, tx_hash
                );
                if let Err(e) = self
                    .store
                    .record_resolution(&rec.market.market_id, verdict.code, &tx_hash)
                    .await
                {
                    warn!(
                        "recording resolution for market {} failed: {}",
                        rec.market.market_id, e
                    );
                }
                rec.tx_hash = Some(tx_hash);
                rec.contract_updated = true;
            }
            Err(e) => {
                warn!("resolving market {} failed: {}", rec.market.market_id, e);
                rec.fail(skip::FAILED_RESOLUTION);
            }
        }
    }
}

fn code_label(code: ResultCode, options: &[String]) -> String {
    match code {
        ResultCode::NotReady => "Not ready".to_string(),
        ResultCode::OptionA => options
            .first()
            .cloned()
            .unwrap_or_else(|| "Option A".to_string()),
        ResultCode::OptionB => options
            .get(1)
            .cloned()
            .unwrap_or_else(|| "Option B".to_string()),
        ResultCode::Push => "Push".to_string(),
        ResultCode::Error => "Error".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_label_uses_market_options() {
        let options = vec!["Yes".to_string(), "No".to_string()];
        assert_eq!(code_label(ResultCode::OptionA, &options), "Yes");
        assert_eq!(code_label(ResultCode::OptionB, &options), "No");
        assert_eq!(code_label(ResultCode::Push, &options), "Push");
    }

    #[test]
    fn test_code_label_falls_back_without_options() {
        assert_eq!(code_label(ResultCode::OptionA, &[]), "Option A");
        assert_eq!(code_label(ResultCode::OptionB, &[]), "Option B");
    }
}
