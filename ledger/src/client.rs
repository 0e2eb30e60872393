//! The ledger client seam.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::info;

use common::config::ChainConfig;
use common::types::{ChainFamily, MarketSnapshot, ResultCode};

use crate::bridge::BridgeLedger;
use crate::evm::EvmLedger;
use crate::registry::ChainRegistry;
use crate::subgraph::SubgraphClient;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("chain {0} is not configured")]
    UnknownChain(String),
    #[error("no read index configured for chain {0}")]
    NoIndex(String),
    #[error("chain {0} is misconfigured: {1}")]
    Misconfigured(String, String),
    #[error("transaction dropped before confirmation")]
    Dropped,
    #[error("transaction {0} reverted")]
    Reverted(String),
    #[error("timed out after {0}s waiting for receipt")]
    ReceiptTimeout(u64),
    #[error("ledger call failed: {0}")]
    Call(#[from] anyhow::Error),
}

/// Inputs for a create-market transaction.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub chain: String,
    pub question: String,
    pub options: Vec<String>,
    pub close_time: DateTime<Utc>,
}

/// Result of a create-market transaction. The market id is only present
/// when the creation event could be decoded from the receipt.
#[derive(Debug, Clone)]
pub struct PublishOutcome {
    pub tx_hash: String,
    pub market_id: Option<String>,
}

#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Markets awaiting resolution on `chain`, at most `cap` of them.
    /// The read index excludes markets that already resolved.
    async fn pending_markets(
        &self,
        chain: &str,
        cap: usize,
    ) -> Result<Vec<MarketSnapshot>, LedgerError>;

    async fn publish_market(&self, req: PublishRequest) -> Result<PublishOutcome, LedgerError>;

    async fn resolve_evm(
        &self,
        chain: &str,
        market_id: &str,
        code: ResultCode,
    ) -> Result<String, LedgerError>;

    async fn resolve_other(
        &self,
        chain: &str,
        market_id: &str,
        code: ResultCode,
    ) -> Result<String, LedgerError>;
}

/// Real ledger client: per-chain EVM contracts, bridge services for
/// non-EVM chains, subgraph read indexes.
pub struct ChainLedger {
    registry: ChainRegistry,
    evm: HashMap<String, EvmLedger>,
    bridges: HashMap<String, BridgeLedger>,
    indexes: HashMap<String, SubgraphClient>,
}

impl ChainLedger {
    pub fn from_config(
        chains: &[ChainConfig],
        receipt_timeout_secs: u64,
    ) -> Result<Self, LedgerError> {
        let registry = ChainRegistry::from_chains(chains);
        let mut evm = HashMap::new();
        let mut bridges = HashMap::new();
        let mut indexes = HashMap::new();

        for chain in chains {
            match registry.family(&chain.id) {
                Some(ChainFamily::Evm) => {
                    evm.insert(
                        chain.id.clone(),
                        EvmLedger::new(chain, receipt_timeout_secs)?,
                    );
                }
                Some(ChainFamily::Other) => {
                    bridges.insert(chain.id.clone(), BridgeLedger::new(chain));
                }
                None => {
                    return Err(LedgerError::Misconfigured(
                        chain.id.clone(),
                        format!("unrecognized family '{}'", chain.family),
                    ))
                }
            }
            if !chain.subgraph_url.is_empty() {
                indexes.insert(
                    chain.id.clone(),
                    SubgraphClient::new(&chain.subgraph_url, chain.id.clone()),
                );
            }
        }

        Ok(Self {
            registry,
            evm,
            bridges,
            indexes,
        })
    }
}

#[async_trait]
impl LedgerClient for ChainLedger {
    async fn pending_markets(
        &self,
        chain: &str,
        cap: usize,
    ) -> Result<Vec<MarketSnapshot>, LedgerError> {
        let index = self
            .indexes
            .get(chain)
            .ok_or_else(|| LedgerError::NoIndex(chain.to_string()))?;
        index.pending_markets(cap).await
    }

    async fn publish_market(&self, req: PublishRequest) -> Result<PublishOutcome, LedgerError> {
        let outcome = match self.registry.family(&req.chain) {
            Some(ChainFamily::Evm) => {
                let ledger = self
                    .evm
                    .get(&req.chain)
                    .ok_or_else(|| LedgerError::UnknownChain(req.chain.clone()))?;
                ledger
                    .create_market(&req.question, &req.options, req.close_time)
                    .await?
            }
            Some(ChainFamily::Other) => {
                let bridge = self
                    .bridges
                    .get(&req.chain)
                    .ok_or_else(|| LedgerError::UnknownChain(req.chain.clone()))?;
                bridge
                    .publish(&req.question, &req.options, req.close_time)
                    .await?
            }
            None => return Err(LedgerError::UnknownChain(req.chain.clone())),
        };

        info!(
            "published market on {}: tx {} id {:?}",
            req.chain, outcome.tx_hash, outcome.market_id
        );
        Ok(outcome)
    }

    async fn resolve_evm(
        &self,
        chain: &str,
        market_id: &str,
        code: ResultCode,
    ) -> Result<String, LedgerError> {
        let ledger = self
            .evm
            .get(chain)
            .ok_or_else(|| LedgerError::UnknownChain(chain.to_string()))?;
        ledger.resolve_market(market_id, code).await
    }

    async fn resolve_other(
        &self,
        chain: &str,
        market_id: &str,
        code: ResultCode,
    ) -> Result<String, LedgerError> {
        let bridge = self
            .bridges
            .get(chain)
            .ok_or_else(|| LedgerError::UnknownChain(chain.to_string()))?;
        bridge.resolve(market_id, code).await
    }
}
