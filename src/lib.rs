//! ELO rating ledger with retroactive recalculation
//!
//! This crate rates completed matches with team ELO, records per-player
//! before/change/after snapshots on every match, and can replay a category's
//! history from any corrected match so the rating chain stays consistent.

pub mod config;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod rating;
pub mod stats;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{LedgerError, Result};
pub use types::*;

// Re-export key components
pub use ledger::{ApplyResult, CancellationFlag, RatingEngine};
pub use rating::{InMemoryLedger, MatchRepository, RatingLedgerStore};
pub use stats::{InMemoryPlayerStats, NoOpPlayerStatsService, PlayerStatsService};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
