//! Grading orchestrator.
//!
//! Stage concurrency is an explicit policy: query generation, evidence
//! gathering and grading fan out across all pending markets at once;
//! ledger writes run sequentially with a jittered delay between them.

use std::time::Duration;

use futures::future::join_all;
use tokio::time::sleep;
use tracing::{info, warn};
use uuid::Uuid;

use common::types::{ChainFamily, PendingResolution};

use crate::stages::GradingPipeline;
use crate::state::{next_state, GradeState};

/// Outcome of one grading run. Records live only for the run; the
/// ledger is the durable record of what resolved.
#[derive(Debug)]
pub struct GradingReport {
    pub run_id: Uuid,
    pub records: Vec<PendingResolution>,
}

impl GradingReport {
    pub fn resolved(&self) -> usize {
        self.records.iter().filter(|r| r.contract_updated).count()
    }

    pub fn failed(&self) -> usize {
        self.records.iter().filter(|r| r.failed).count()
    }

    pub fn not_ready(&self) -> usize {
        self.records
            .iter()
            .filter(|r| {
                r.verdict
                    .as_ref()
                    .map(|v| !v.code.is_writable())
                    .unwrap_or(false)
            })
            .count()
    }

    pub fn log_summary(&self) {
        info!(
            "grading run {} finished: {} markets, {} resolved, {} not ready, {} failed",
            self.run_id,
            self.records.len(),
            self.resolved(),
            self.not_ready(),
            self.failed()
        );
        for record in self.records.iter().filter(|r| r.failed) {
            info!(
                "  market {} failed: {}",
                record.market.market_id,
                record.fail_reason.as_deref().unwrap_or("unknown")
            );
        }
    }
}

impl GradingPipeline {
    /// Pending markets across all configured chains, capped per chain.
    /// A chain whose index is unreachable contributes nothing.
    pub async fn fetch_pending(&self) -> Vec<PendingResolution> {
        let mut records = Vec::new();
        for chain in &self.cfg.chains {
            match self
                .ledger
                .pending_markets(chain, self.cfg.pending_batch_size)
                .await
            {
                Ok(markets) => {
                    info!("✅ fetched {} pending markets on {}", markets.len(), chain);
                    records.extend(markets.into_iter().map(PendingResolution::new));
                }
                Err(e) => warn!("pending fetch on {} failed: {}", chain, e),
            }
        }
        records
    }

    /// Drive one record from query generation through chain routing.
    async fn prepare(&self, mut rec: PendingResolution) -> PendingResolution {
        let mut state = GradeState::GenerateQueries;
        loop {
            match state {
                GradeState::GenerateQueries => self.generate_queries(&mut rec).await,
                GradeState::GatherEvidence => self.gather_evidence(&mut rec).await,
                GradeState::Grade => self.grade(&mut rec).await,
                GradeState::ChooseChain => self.choose_chain(&mut rec),
                _ => break,
            }
            state = next_state(state, &rec);
            if matches!(
                state,
                GradeState::ResolveEvm | GradeState::ResolveOther | GradeState::End
            ) {
                break;
            }
        }
        rec
    }

    /// Grade the given records and submit the writable verdicts.
    pub async fn process(&self, records: Vec<PendingResolution>) -> GradingReport {
        let run_id = Uuid::new_v4();
        info!("grading run {} over {} pending markets", run_id, records.len());

        let prepared = join_all(records.into_iter().map(|rec| self.prepare(rec))).await;

        let mut finished = Vec::with_capacity(prepared.len());
        let mut wrote = false;
        for mut rec in prepared {
            match next_state(GradeState::ChooseChain, &rec) {
                GradeState::ResolveEvm => {
                    if wrote {
                        self.write_delay().await;
                    }
                    self.resolve(&mut rec, ChainFamily::Evm).await;
                    wrote = true;
                }
                GradeState::ResolveOther => {
                    if wrote {
                        self.write_delay().await;
                    }
                    self.resolve(&mut rec, ChainFamily::Other).await;
                    wrote = true;
                }
                _ => {}
            }
            finished.push(rec);
        }

        GradingReport {
            run_id,
            records: finished,
        }
    }

    /// One full pass: fetch the pending snapshot, then process it.
    pub async fn run(&self) -> GradingReport {
        let records = self.fetch_pending().await;
        self.process(records).await
    }

    /// Jittered pause between consecutive ledger writes.
    async fn write_delay(&self) {
        let min = self.cfg.write_jitter_min_ms;
        let max = self.cfg.write_jitter_max_ms.max(min);
        let ms = if max > min {
            fastrand::u64(min..=max)
        } else {
            min
        };
        sleep(Duration::from_millis(ms)).await;
    }
}
