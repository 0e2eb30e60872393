//! Generation orchestrator.
//!
//! Runs the state machine once per post, sequentially (ledger writes
//! live inside the loop), and folds per-item results into the run
//! aggregate with the field-preserving merge.

use std::collections::HashMap;

use dashmap::DashMap;
use tracing::{info, warn};
use uuid::Uuid;

use common::types::{Post, WorkItem};

use crate::stages::GenerationPipeline;
use crate::state::{next_state, GenState};

/// Outcome of one generation run.
#[derive(Debug)]
pub struct GenerationReport {
    pub run_id: Uuid,
    pub items: Vec<WorkItem>,
}

impl GenerationReport {
    pub fn published(&self) -> usize {
        self.items.iter().filter(|i| i.is_published()).count()
    }

    pub fn skipped(&self) -> usize {
        self.items.iter().filter(|i| !i.should_process).count()
    }

    pub fn skip_counts(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for item in &self.items {
            if let Some(reason) = &item.skip_reason {
                *counts.entry(reason.clone()).or_insert(0) += 1;
            }
        }
        counts
    }

    pub fn log_summary(&self) {
        info!(
            "generation run {} finished: {} items, {} published, {} skipped",
            self.run_id,
            self.items.len(),
            self.published(),
            self.skipped()
        );
        for (reason, count) in self.skip_counts() {
            info!("  skipped {}: {}", reason, count);
        }
    }
}

impl GenerationPipeline {
    /// Drive one item through the full state machine.
    pub async fn run_item(&self, mut item: WorkItem) -> WorkItem {
        let mut state = GenState::Start;
        loop {
            state = next_state(state, &item);
            match state {
                GenState::End => break,
                GenState::ExtractQuery => self.extract_queries(&mut item).await,
                GenState::CheckExternalLink => self.check_external_link(&mut item).await,
                GenState::NewsSearch => self.news_search(&mut item).await,
                GenState::TavilySearch => self.web_search(&mut item).await,
                GenState::SynthesizeIdea => self.synthesize_idea(&mut item).await,
                GenState::GenerateImage => self.generate_image(&mut item).await,
                GenState::PublishMarket => self.publish_market(&mut item).await,
                GenState::Persist => self.persist(&item).await,
                GenState::Start => {}
            }
        }
        item
    }

    /// One batch pass over a feed snapshot. Prior state is preloaded by
    /// post id so items published in an earlier run short-circuit.
    pub async fn run_batch(&self, posts: Vec<Post>) -> GenerationReport {
        let run_id = Uuid::new_v4();
        info!("generation run {} over {} posts", run_id, posts.len());

        let results: DashMap<String, WorkItem> = DashMap::new();
        for post in posts {
            let item = match self.store.load_work_item(&post.id).await {
                Ok(Some(prior)) => prior,
                Ok(None) => WorkItem::new(post),
                Err(e) => {
                    warn!("loading prior state for {} failed: {}", post.id, e);
                    WorkItem::new(post)
                }
            };

            let post_id = item.post.id.clone();
            let finished = self.run_item(item).await;

            let merged = match results.remove(&post_id) {
                Some((_, prior)) => prior.absorb(finished),
                None => finished,
            };
            results.insert(post_id, merged);
        }

        GenerationReport {
            run_id,
            items: results.into_iter().map(|(_, item)| item).collect(),
        }
    }
}
