//! Utility functions for the rating ledger

use crate::types::Match;
use uuid::Uuid;

/// Lower-case and trim a raw player name into its lookup form
pub fn normalize_player_name(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Generate a new unique recalculation run ID
pub fn generate_run_id() -> Uuid {
    Uuid::new_v4()
}

/// Sort matches ascending by `(datetime, id)`; ties on the timestamp fall
/// back to lexicographic match id so replay order is reproducible.
pub fn sort_chronologically(matches: &mut [Match]) {
    matches.sort_by(|a, b| {
        a.datetime
            .cmp(&b.datetime)
            .then_with(|| a.id.cmp(&b.id))
    });
}
