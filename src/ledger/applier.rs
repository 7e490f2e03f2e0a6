//! Applies the outcome of one completed match to player ratings
//!
//! Reads every participant's current rating, rates each side against the
//! pre-match strength of the other, and commits all snapshots and ratings
//! of the match in a single atomic store call.

use crate::error::{LedgerError, Result};
use crate::rating::elo::EloCalculator;
use crate::rating::storage::RatingLedgerStore;
use crate::stats::PlayerStatsService;
use crate::types::{
    Match, MatchId, MatchRatingUpdate, Outcome, PlayerKey, RatingSnapshot, RatingWrite,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What happened when a match was handed to the applier
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyResult {
    /// Ratings were written; snapshots are in participant order
    Applied {
        match_id: MatchId,
        snapshots: Vec<(PlayerKey, RatingSnapshot)>,
    },
    /// The match is not eligible for rating; nothing was written
    Skipped { match_id: MatchId, reason: String },
}

impl ApplyResult {
    pub fn is_applied(&self) -> bool {
        matches!(self, ApplyResult::Applied { .. })
    }

    pub fn snapshot_for(&self, player_key: &PlayerKey) -> Option<RatingSnapshot> {
        match self {
            ApplyResult::Applied { snapshots, .. } => snapshots
                .iter()
                .find(|(key, _)| key == player_key)
                .map(|(_, snapshot)| *snapshot),
            ApplyResult::Skipped { .. } => None,
        }
    }
}

/// Team ratings computed from pre-match values
#[derive(Debug, Clone, Copy, PartialEq)]
struct TeamRatings {
    winners: f64,
    losers: f64,
    has_winners: bool,
    has_losers: bool,
}

impl TeamRatings {
    /// Rating the participant is measured against; `None` when a winner has
    /// no losers to beat or a loser no winners to lose to
    fn opponent_of(&self, outcome: Outcome) -> Option<f64> {
        match outcome {
            Outcome::Win if self.has_losers => Some(self.losers),
            Outcome::Loss if self.has_winners => Some(self.winners),
            Outcome::Win | Outcome::Loss => None,
            Outcome::Draw if self.has_winners => Some(self.winners),
            Outcome::Draw => Some(self.losers),
        }
    }
}

/// Rates a single match and persists the result
pub struct MatchOutcomeApplier {
    store: Arc<dyn RatingLedgerStore>,
    stats: Arc<dyn PlayerStatsService>,
    calculator: EloCalculator,
}

impl MatchOutcomeApplier {
    pub fn new(
        store: Arc<dyn RatingLedgerStore>,
        stats: Arc<dyn PlayerStatsService>,
        calculator: EloCalculator,
    ) -> Self {
        Self {
            store,
            stats,
            calculator,
        }
    }

    pub fn calculator(&self) -> &EloCalculator {
        &self.calculator
    }

    /// Rate `game` from the ratings currently in the store.
    ///
    /// Ineligible matches are a logged no-op. Malformed participant lists
    /// fail with `Validation`; store failures propagate unchanged.
    pub async fn apply(&self, game: &Match) -> Result<ApplyResult> {
        if let Some(reason) = game.ineligibility_reason() {
            warn!(match_id = %game.id, %reason, "Match not eligible for rating, skipping");
            return Ok(ApplyResult::Skipped {
                match_id: game.id.clone(),
                reason,
            });
        }
        validate_participants(game)?;

        // Current ratings, before any write for this match
        let mut current = Vec::with_capacity(game.participants.len());
        for participant in &game.participants {
            let stored = self
                .store
                .get_rating(&participant.player_key, &game.category)
                .await?;
            current.push(stored);
        }

        let update = self.compute_update(game, &current);
        self.store.commit_match(&update).await?;

        info!(
            match_id = %game.id,
            category = %game.category,
            players = update.writes.len(),
            "Match ratings applied"
        );

        if let Err(e) = self.stats.recompute_after_match(&game.id).await {
            warn!(match_id = %game.id, error = %e, "Player stats refresh failed");
        }

        Ok(ApplyResult::Applied {
            match_id: game.id.clone(),
            snapshots: update
                .writes
                .into_iter()
                .map(|write| (write.player_key, write.snapshot))
                .collect(),
        })
    }

    /// Pure part of the application: `current[i]` is the stored rating of
    /// `game.participants[i]`.
    fn compute_update(&self, game: &Match, current: &[Option<f64>]) -> MatchRatingUpdate {
        let starting = self.calculator.starting_rating();
        let before: Vec<f64> = current.iter().map(|r| r.unwrap_or(starting)).collect();

        let side = |outcome: Outcome| -> Vec<f64> {
            game.participants
                .iter()
                .zip(&before)
                .filter(|(p, _)| p.outcome == outcome)
                .map(|(_, rating)| *rating)
                .collect()
        };
        let winners = side(Outcome::Win);
        let losers = side(Outcome::Loss);
        let teams = TeamRatings {
            winners: self.calculator.team_rating(&winners),
            losers: self.calculator.team_rating(&losers),
            has_winners: !winners.is_empty(),
            has_losers: !losers.is_empty(),
        };
        debug!(
            match_id = %game.id,
            winner_team = teams.winners,
            loser_team = teams.losers,
            "Team ratings computed"
        );

        let writes = game
            .participants
            .iter()
            .zip(before.iter().zip(current))
            .map(|(participant, (rating, stored))| {
                let change = teams
                    .opponent_of(participant.outcome)
                    .map_or(0.0, |opponent| {
                        self.calculator.delta(*rating, opponent, participant.outcome)
                    });
                RatingWrite {
                    player_key: participant.player_key.clone(),
                    expected_current: *stored,
                    snapshot: RatingSnapshot::new(*rating, change),
                }
            })
            .collect();

        MatchRatingUpdate {
            match_id: game.id.clone(),
            category: game.category.clone(),
            writes,
        }
    }
}

pub(crate) fn validate_participants(game: &Match) -> Result<()> {
    let mut seen = HashSet::with_capacity(game.participants.len());
    for participant in &game.participants {
        if participant.player_key.is_empty() {
            return Err(LedgerError::validation(format!(
                "match {} has a participant with an empty name",
                game.id
            )));
        }
        if !seen.insert(&participant.player_key) {
            return Err(LedgerError::validation(format!(
                "player {} appears more than once in match {}",
                participant.player_key, game.id
            )));
        }
    }
    Ok(())
}
