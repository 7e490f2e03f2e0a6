//! ELO rating math and the storage contracts it is persisted through
//!
//! This module provides the pure rating formulas, the repository and ledger
//! store interfaces, and an in-memory backend implementing both.

pub mod elo;
pub mod memory;
pub mod storage;

// Re-export commonly used types
pub use elo::{delta, expected_score, round2, team_rating, EloCalculator};
pub use memory::InMemoryLedger;
pub use storage::{MatchFilter, MatchRepository, RatingLedgerStore};
