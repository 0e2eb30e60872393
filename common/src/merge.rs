//! Field-preserving merge for per-item pipeline state.
//!
//! When per-item results are folded back into the run aggregate, new
//! data replaces old except for ledger identifiers, which survive an
//! empty update. A stage that never touched the ledger fields can
//! therefore never erase them.

use crate::types::{PendingResolution, WorkItem};

/// Keep the prior identifier whenever the update carries none.
fn keep_identifier(prior: Option<String>, update: Option<String>) -> Option<String> {
    match update {
        Some(value) if !value.is_empty() => Some(value),
        _ => prior,
    }
}

impl WorkItem {
    /// Merge an updated copy of this item over the prior one.
    pub fn absorb(self, update: WorkItem) -> WorkItem {
        let mut merged = update;
        merged.transaction_hash = keep_identifier(self.transaction_hash, merged.transaction_hash);
        merged.market_id = keep_identifier(self.market_id, merged.market_id);
        merged
    }
}

impl PendingResolution {
    /// Merge an updated copy of this record over the prior one.
    pub fn absorb(self, update: PendingResolution) -> PendingResolution {
        let mut merged = update;
        merged.tx_hash = keep_identifier(self.tx_hash, merged.tx_hash);
        // contract_updated implies a recorded tx_hash; once true it stays true.
        merged.contract_updated = merged.contract_updated || self.contract_updated;
        merged
    }
}
