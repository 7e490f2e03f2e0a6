//! Consistency check of a category's rating chain
//!
//! For every player, consecutive rated matches must link up: the `before` of
//! each snapshot equals the `after` of the player's previous snapshot.

use crate::error::Result;
use crate::rating::storage::{MatchFilter, MatchRepository};
use crate::types::{Category, MatchId, PlayerKey};
use crate::utils::sort_chronologically;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

const TOLERANCE: f64 = 1e-9;

/// A link of the chain that does not hold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainBreak {
    pub player_key: PlayerKey,
    pub match_id: MatchId,
    /// `after` of the player's previous rated match
    pub expected_before: f64,
    /// `None` when the match carries no snapshot for the player
    pub recorded_before: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainAudit {
    pub category: Category,
    pub matches_checked: usize,
    pub breaks: Vec<ChainBreak>,
}

impl ChainAudit {
    pub fn is_consistent(&self) -> bool {
        self.breaks.is_empty()
    }
}

/// Walk every rateable completed match of `category` in replay order
pub async fn verify_chain(matches: &dyn MatchRepository, category: &str) -> Result<ChainAudit> {
    let mut history: Vec<_> = matches
        .list(&MatchFilter::completed(category))
        .await?
        .into_iter()
        .filter(|game| game.is_rateable())
        .collect();
    sort_chronologically(&mut history);

    let mut last_after: HashMap<PlayerKey, f64> = HashMap::new();
    let mut breaks = Vec::new();

    for game in &history {
        for participant in &game.participants {
            let recorded = participant.rating_snapshot;
            let previous = last_after.get(&participant.player_key).copied();

            match (previous, recorded) {
                (Some(expected), Some(snapshot))
                    if (snapshot.before - expected).abs() <= TOLERANCE => {}
                (Some(expected), recorded) => breaks.push(ChainBreak {
                    player_key: participant.player_key.clone(),
                    match_id: game.id.clone(),
                    expected_before: expected,
                    recorded_before: recorded.map(|s| s.before),
                }),
                // First appearance: nothing to link to
                (None, _) => {}
            }

            if let Some(snapshot) = recorded {
                last_after.insert(participant.player_key.clone(), snapshot.after);
            }
        }
    }

    if breaks.is_empty() {
        debug!(category, matches = history.len(), "Rating chain consistent");
    } else {
        warn!(category, matches = history.len(), breaks = breaks.len(), "Rating chain broken");
    }

    Ok(ChainAudit {
        category: category.to_string(),
        matches_checked: history.len(),
        breaks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rating::memory::InMemoryLedger;
    use crate::types::{Match, MatchState, Outcome, Participant, RatingSnapshot};
    use chrono::{TimeZone, Utc};

    fn rated(id: &str, hour: u32, a: Option<(f64, f64)>, b: (f64, f64)) -> Match {
        let mut first = Participant::new("a", Outcome::Win);
        first.rating_snapshot = a.map(|(before, change)| RatingSnapshot::new(before, change));
        let mut second = Participant::new("b", Outcome::Loss);
        second.rating_snapshot = Some(RatingSnapshot::new(b.0, b.1));
        Match {
            id: id.to_string(),
            datetime: Some(Utc.with_ymd_and_hms(2024, 7, 1, hour, 0, 0).unwrap()),
            category: "default".to_string(),
            state: MatchState::Completed,
            participants: vec![first, second],
        }
    }

    #[tokio::test]
    async fn test_linked_chain_is_consistent() {
        let ledger = InMemoryLedger::with_matches(vec![
            rated("m1", 10, Some((1000.0, 16.0)), (1000.0, -16.0)),
            rated("m2", 11, Some((1016.0, 14.53)), (984.0, -14.53)),
        ])
        .unwrap();

        let audit = verify_chain(&ledger, "default").await.unwrap();

        assert!(audit.is_consistent());
        assert_eq!(audit.matches_checked, 2);
    }

    #[tokio::test]
    async fn test_mismatched_before_is_reported() {
        let ledger = InMemoryLedger::with_matches(vec![
            rated("m1", 10, Some((1000.0, 16.0)), (1000.0, -16.0)),
            rated("m2", 11, Some((1000.0, 16.0)), (984.0, -16.0)),
        ])
        .unwrap();

        let audit = verify_chain(&ledger, "default").await.unwrap();

        assert_eq!(
            audit.breaks,
            vec![ChainBreak {
                player_key: PlayerKey::new("a"),
                match_id: "m2".to_string(),
                expected_before: 1016.0,
                recorded_before: Some(1000.0),
            }]
        );
    }

    #[tokio::test]
    async fn test_missing_snapshot_is_a_break() {
        let ledger = InMemoryLedger::with_matches(vec![
            rated("m1", 10, Some((1000.0, 16.0)), (1000.0, -16.0)),
            rated("m2", 11, None, (984.0, -14.53)),
        ])
        .unwrap();

        let audit = verify_chain(&ledger, "default").await.unwrap();

        assert_eq!(audit.breaks.len(), 1);
        assert_eq!(audit.breaks[0].recorded_before, None);
    }

    #[tokio::test]
    async fn test_empty_category() {
        let audit = verify_chain(&InMemoryLedger::new(), "none").await.unwrap();
        assert!(audit.is_consistent());
        assert_eq!(audit.matches_checked, 0);
    }
}
