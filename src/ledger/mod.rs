//! Rating ledger operations
//!
//! Applying a single match outcome, recalculating a category from a corrected
//! match onward, and auditing the resulting rating chain.

pub mod applier;
pub mod audit;
pub mod coordinator;
pub mod engine;
pub mod locks;
pub mod retry;

pub use applier::{ApplyResult, MatchOutcomeApplier};
pub use audit::{verify_chain, ChainAudit, ChainBreak};
pub use coordinator::{CancellationFlag, RecalculationCoordinator, RecalculationPhase};
pub use engine::RatingEngine;
pub use locks::{CategoryGuard, CategoryLocks};
pub use retry::{retry_on_conflict, RetryPolicy};
