//! EVM ledger client.
//!
//! Wraps the prediction pool contract behind generated bindings. Every
//! receipt wait runs under the configured ceiling; a timeout is a stage
//! failure for the caller, never an indefinitely pending item.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ethers::abi::RawLog;
use ethers::contract::EthLogDecode;
use ethers::prelude::*;
use tokio::time::timeout;
use tracing::debug;

use common::config::ChainConfig;
use common::types::ResultCode;

use crate::client::{LedgerError, PublishOutcome};

abigen!(
    PredictionPool,
    r#"[
        function createPool(string question, string[] options, uint256 closeTime) returns (uint256)
        function resolvePool(uint256 poolId, uint8 result)
        event PoolCreated(uint256 indexed poolId, address indexed creator, string question, uint256 closeTime)
        event PoolResolved(uint256 indexed poolId, uint8 result)
    ]"#
);

type EvmClient = SignerMiddleware<Provider<Http>, LocalWallet>;

pub struct EvmLedger {
    contract: PredictionPool<EvmClient>,
    receipt_timeout: Duration,
    timeout_secs: u64,
}

impl EvmLedger {
    pub fn new(cfg: &ChainConfig, receipt_timeout_secs: u64) -> Result<Self, LedgerError> {
        if cfg.chain_id == 0 {
            return Err(LedgerError::Misconfigured(
                cfg.id.clone(),
                "chain_id must be set".into(),
            ));
        }

        let provider = Provider::<Http>::try_from(cfg.rpc_url.as_str())
            .map_err(|e| LedgerError::Misconfigured(cfg.id.clone(), e.to_string()))?;
        let wallet = cfg
            .signer_key
            .parse::<LocalWallet>()
            .map_err(|e| LedgerError::Misconfigured(cfg.id.clone(), e.to_string()))?
            .with_chain_id(cfg.chain_id);
        let address = cfg
            .contract_address
            .parse::<Address>()
            .map_err(|e| LedgerError::Misconfigured(cfg.id.clone(), e.to_string()))?;

        let client = Arc::new(SignerMiddleware::new(provider, wallet));

        Ok(Self {
            contract: PredictionPool::new(address, client),
            receipt_timeout: Duration::from_secs(receipt_timeout_secs),
            timeout_secs: receipt_timeout_secs,
        })
    }

    pub async fn create_market(
        &self,
        question: &str,
        options: &[String],
        close_time: DateTime<Utc>,
    ) -> Result<PublishOutcome, LedgerError> {
        let close_ts = U256::from(close_time.timestamp().max(0) as u64);
        let call = self
            .contract
            .create_pool(question.to_string(), options.to_vec(), close_ts);

        let pending = call
            .send()
            .await
            .map_err(|e| LedgerError::Call(anyhow::anyhow!(e)))?;
        let tx_hash = format!("{:#x}", *pending);

        let receipt = self.await_receipt(pending, &tx_hash).await?;
        let market_id = decode_pool_id(&receipt);
        if market_id.is_none() {
            debug!("no PoolCreated event in receipt {}", tx_hash);
        }

        Ok(PublishOutcome { tx_hash, market_id })
    }

    pub async fn resolve_market(
        &self,
        market_id: &str,
        code: ResultCode,
    ) -> Result<String, LedgerError> {
        let pool_id = U256::from_dec_str(market_id).map_err(|e| {
            LedgerError::Call(anyhow::anyhow!("market id '{}' is not numeric: {}", market_id, e))
        })?;

        let call = self.contract.resolve_pool(pool_id, code.as_u8());
        let pending = call
            .send()
            .await
            .map_err(|e| LedgerError::Call(anyhow::anyhow!(e)))?;
        let tx_hash = format!("{:#x}", *pending);

        self.await_receipt(pending, &tx_hash).await?;
        Ok(tx_hash)
    }

    async fn await_receipt(
        &self,
        pending: PendingTransaction<'_, Http>,
        tx_hash: &str,
    ) -> Result<TransactionReceipt, LedgerError> {
        let receipt = timeout(self.receipt_timeout, pending)
            .await
            .map_err(|_| LedgerError::ReceiptTimeout(self.timeout_secs))?
            .map_err(|e| LedgerError::Call(anyhow::anyhow!(e)))?
            .ok_or(LedgerError::Dropped)?;

        if receipt.status == Some(U64::zero()) {
            return Err(LedgerError::Reverted(tx_hash.to_string()));
        }
        Ok(receipt)
    }
}

/// Pool id from the creation event, when the receipt carries one.
fn decode_pool_id(receipt: &TransactionReceipt) -> Option<String> {
    receipt.logs.iter().find_map(|log| {
        let raw = RawLog {
            topics: log.topics.clone(),
            data: log.data.to_vec(),
        };
        <PoolCreatedFilter as EthLogDecode>::decode_log(&raw)
            .ok()
            .map(|ev| ev.pool_id.to_string())
    })
}
