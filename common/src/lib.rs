//! Shared domain types and services for the market pipelines.
//!
//! This crate holds everything both pipelines agree on:
//! - Core types (posts, evidence, work items, pending resolutions, result codes)
//! - The field-preserving merge rule for per-item state
//! - Application configuration (built once, threaded everywhere)
//! - The persistence store (Postgres + in-memory)

pub mod config;
pub mod merge;
pub mod skip;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use config::{
    AppConfig, ChainConfig, DatabaseConfig, FeedConfig, GenerationConfig, GradingConfig,
    ImageConfig, LlmConfig, SearchConfig,
};
pub use store::{MarketStore, MemoryStore, PostgresStore};
pub use types::{
    ChainFamily, Evidence, MarketSnapshot, PendingResolution, Post, ResultCode, Verdict, WorkItem,
};
