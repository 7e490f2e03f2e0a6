//! In-memory ledger backend
//!
//! Matches and ratings live behind a single lock so a match commit can update
//! both atomically. Used by the replay binary, tests and benchmarks.

use crate::error::{LedgerError, Result};
use crate::rating::storage::{match_not_found, MatchFilter, MatchRepository, RatingLedgerStore};
use crate::types::{Category, Match, MatchId, MatchRatingUpdate, PlayerKey, RatingSnapshot};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct LedgerState {
    matches: HashMap<MatchId, Match>,
    ratings: HashMap<(Category, PlayerKey), f64>,
}

/// Match repository and rating store sharing one in-memory state
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: RwLock<LedgerState>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a ledger pre-populated with match history
    pub fn with_matches(matches: impl IntoIterator<Item = Match>) -> Result<Self> {
        let ledger = Self::new();
        for game in matches {
            ledger.insert_match(game)?;
        }
        Ok(ledger)
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, LedgerState>> {
        self.state
            .read()
            .map_err(|_| LedgerError::persistence("Failed to acquire ledger read lock"))
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, LedgerState>> {
        self.state
            .write()
            .map_err(|_| LedgerError::persistence("Failed to acquire ledger write lock"))
    }

    /// Insert or replace a match, returning the previous version
    pub fn insert_match(&self, game: Match) -> Result<Option<Match>> {
        let mut state = self.write_state()?;
        Ok(state.matches.insert(game.id.clone(), game))
    }

    /// Current rating with its category, if the player has one
    #[cfg(test)]
    pub(crate) fn rating_state(
        &self,
        player_key: &PlayerKey,
        category: &str,
    ) -> Result<Option<crate::types::RatingState>> {
        let state = self.read_state()?;
        Ok(state
            .ratings
            .get(&(category.to_string(), player_key.clone()))
            .map(|score| crate::types::RatingState {
                category: category.to_string(),
                score: *score,
            }))
    }

    /// Every rated player of a category, sorted by player key
    pub fn ratings_in_category(&self, category: &str) -> Result<Vec<(PlayerKey, f64)>> {
        let state = self.read_state()?;
        let mut ratings: Vec<(PlayerKey, f64)> = state
            .ratings
            .iter()
            .filter(|((rated_category, _), _)| rated_category == category)
            .map(|((_, player_key), score)| (player_key.clone(), *score))
            .collect();
        ratings.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(ratings)
    }

    /// Distinct categories present in the stored match history
    pub fn categories(&self) -> Result<Vec<Category>> {
        let state = self.read_state()?;
        let mut categories: Vec<Category> = state
            .matches
            .values()
            .map(|game| game.category.clone())
            .collect();
        categories.sort();
        categories.dedup();
        Ok(categories)
    }

    pub fn match_count(&self) -> Result<usize> {
        Ok(self.read_state()?.matches.len())
    }
}

#[async_trait]
impl MatchRepository for InMemoryLedger {
    async fn get(&self, match_id: &MatchId) -> Result<Match> {
        let state = self.read_state()?;
        state
            .matches
            .get(match_id)
            .cloned()
            .ok_or_else(|| match_not_found(match_id))
    }

    async fn list(&self, filter: &MatchFilter) -> Result<Vec<Match>> {
        let state = self.read_state()?;
        Ok(state
            .matches
            .values()
            .filter(|game| filter.matches(game))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RatingLedgerStore for InMemoryLedger {
    async fn get_rating(&self, player_key: &PlayerKey, category: &str) -> Result<Option<f64>> {
        let state = self.read_state()?;
        Ok(state
            .ratings
            .get(&(category.to_string(), player_key.clone()))
            .copied())
    }

    async fn set_rating(&self, player_key: &PlayerKey, category: &str, score: f64) -> Result<()> {
        let mut state = self.write_state()?;
        state
            .ratings
            .insert((category.to_string(), player_key.clone()), score);
        Ok(())
    }

    async fn set_ratings(&self, category: &str, scores: &[(PlayerKey, f64)]) -> Result<()> {
        let mut state = self.write_state()?;
        for (player_key, score) in scores {
            state
                .ratings
                .insert((category.to_string(), player_key.clone()), *score);
        }
        Ok(())
    }

    async fn write_snapshot(
        &self,
        match_id: &MatchId,
        player_key: &PlayerKey,
        snapshot: RatingSnapshot,
    ) -> Result<()> {
        let mut state = self.write_state()?;
        let game = state
            .matches
            .get_mut(match_id)
            .ok_or_else(|| match_not_found(match_id))?;
        let participant = game.participant_mut(player_key).ok_or_else(|| {
            LedgerError::not_found(format!("player {} in match {}", player_key, match_id))
        })?;
        participant.rating_snapshot = Some(snapshot);
        Ok(())
    }

    async fn commit_match(&self, update: &MatchRatingUpdate) -> Result<()> {
        let mut state = self.write_state()?;

        // Validate everything before touching anything
        let game = state
            .matches
            .get(&update.match_id)
            .ok_or_else(|| match_not_found(&update.match_id))?;
        for write in &update.writes {
            if !game.has_player(&write.player_key) {
                return Err(LedgerError::not_found(format!(
                    "player {} in match {}",
                    write.player_key, update.match_id
                )));
            }
        }
        for write in &update.writes {
            let current = state
                .ratings
                .get(&(update.category.clone(), write.player_key.clone()))
                .copied();
            if current != write.expected_current {
                return Err(LedgerError::conflict(format!(
                    "rating of {} in {} changed from {:?} to {:?} while rating match {}",
                    write.player_key,
                    update.category,
                    write.expected_current,
                    current,
                    update.match_id
                )));
            }
        }

        let LedgerState { matches, ratings } = &mut *state;
        if let Some(game) = matches.get_mut(&update.match_id) {
            for write in &update.writes {
                if let Some(participant) = game.participant_mut(&write.player_key) {
                    participant.rating_snapshot = Some(write.snapshot);
                }
                ratings.insert(
                    (update.category.clone(), write.player_key.clone()),
                    write.snapshot.after,
                );
            }
        }

        Ok(())
    }
}
