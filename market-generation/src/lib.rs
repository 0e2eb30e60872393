//! Generation pipeline: social post in, published market out.
//!
//! One explicit state machine per work item. Each stage only adds data
//! or flips the item to terminal-failed with a reason; the idempotency
//! guard in front of every side-effecting stage keeps already-published
//! items away from the ledger.

pub mod orchestrator;
pub mod stages;
pub mod state;

pub use orchestrator::GenerationReport;
pub use stages::GenerationPipeline;
pub use state::{has_external_link, next_state, should_continue, GenState};
