//! Grading pipeline: pending market in, on-chain resolution out.
//!
//! Pending markets are re-derived from the ledger's read index every
//! run; nothing is queued locally. The resolution submitter is gated on
//! a writable result code and on `contract_updated`, which makes
//! re-running after a crash safe: a resolution that already landed is
//! never submitted twice.

pub mod orchestrator;
pub mod stages;
pub mod state;

pub use orchestrator::GradingReport;
pub use stages::GradingPipeline;
pub use state::{can_resolve, next_state, GradeState};
