//! Error types for the rating ledger
//!
//! Every fallible ledger operation returns a typed [`LedgerError`] so callers
//! can tell retryable interleavings apart from bad input and store failures.

use crate::types::MatchId;

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Failures surfaced by the rating ledger and its collaborators
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Validation failed: {reason}")]
    Validation { reason: String },

    #[error("Not found: {what}")]
    NotFound { what: String },

    #[error("Concurrent write detected: {message}")]
    Conflict { message: String },

    #[error("Persistence failure: {message}")]
    Persistence { message: String },

    #[error("Operation cancelled: {message}")]
    Cancelled { message: String },

    #[error(
        "Recalculation aborted after {:?} with {} matches remaining: {source}",
        .last_successful_match_id,
        .remaining_match_ids.len()
    )]
    PartialRecalculation {
        last_successful_match_id: Option<MatchId>,
        remaining_match_ids: Vec<MatchId>,
        #[source]
        source: Box<LedgerError>,
    },
}

impl LedgerError {
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence {
            message: message.into(),
        }
    }

    /// Only interleaved writes are worth retrying; everything else is
    /// either permanent or governed by the store's own policy.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Conflict { .. })
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, LedgerError::PartialRecalculation { .. })
    }
}
