//! Ledger access for the market pipelines.
//!
//! The chain contract and its read index are the durable record of
//! markets and resolutions. This crate exposes:
//! - `LedgerClient`: the trait both orchestrators program against
//! - `ChainLedger`: the real implementation routing per-chain to an EVM
//!   client or a bridge service
//! - `SubgraphClient`: the read index for pending markets

pub mod bridge;
pub mod client;
pub mod evm;
pub mod registry;
pub mod subgraph;

pub use client::{ChainLedger, LedgerClient, LedgerError, PublishOutcome, PublishRequest};
pub use registry::ChainRegistry;
pub use subgraph::SubgraphClient;
