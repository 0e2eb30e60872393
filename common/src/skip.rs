//! Skip and failure reason vocabulary.
//!
//! Stages, logs and persistence all use these constants so a reason
//! recorded in one run can be matched in the next.

pub const FILTERED: &str = "filtered";
pub const ALREADY_PUBLISHED: &str = "already_published";
pub const FAILED_QUERY_EXTRACTION: &str = "failed_query_extraction";
pub const NO_QUESTION: &str = "no_question";
pub const FAILED_IMAGE: &str = "failed_image";
pub const FAILED_POOL_CREATION: &str = "failed_pool_creation";
pub const DRY_RUN: &str = "dry_run";

pub const FAILED_QUERY_GENERATION: &str = "failed_query_generation";
pub const NO_EVIDENCE: &str = "no_evidence";
pub const FAILED_GRADING: &str = "failed_grading";
pub const UNKNOWN_CHAIN: &str = "unknown_chain";
pub const FAILED_RESOLUTION: &str = "failed_resolution";
