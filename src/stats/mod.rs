//! Player statistics refreshed after every rated match
//!
//! The ledger only notifies this service; failures here never undo a rating
//! write.

use crate::error::{LedgerError, Result};
use crate::rating::storage::{MatchFilter, MatchRepository};
use crate::types::{Category, MatchId, Outcome, PlayerKey};
use crate::utils::sort_chronologically;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Receives a notification whenever a match's ratings have been written
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlayerStatsService: Send + Sync {
    /// Recompute aggregate statistics of every player in the match
    async fn recompute_after_match(&self, match_id: &MatchId) -> Result<()>;
}

/// Stats service that ignores notifications
#[derive(Debug, Clone, Default)]
pub struct NoOpPlayerStatsService;

#[async_trait]
impl PlayerStatsService for NoOpPlayerStatsService {
    async fn recompute_after_match(&self, _match_id: &MatchId) -> Result<()> {
        Ok(())
    }
}

/// Aggregate record of one player in one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerCategoryStats {
    pub player_key: PlayerKey,
    pub category: Category,
    pub games_played: u64,
    pub wins: u64,
    pub losses: u64,
    pub draws: u64,
    pub score: f64,
    pub peak_score: f64,
    pub last_played: Option<DateTime<Utc>>,
}

impl PlayerCategoryStats {
    fn new(player_key: PlayerKey, category: Category, starting_rating: f64) -> Self {
        Self {
            player_key,
            category,
            games_played: 0,
            wins: 0,
            losses: 0,
            draws: 0,
            score: starting_rating,
            peak_score: starting_rating,
            last_played: None,
        }
    }
}

/// Stats service rebuilding aggregates from the rated match history
pub struct InMemoryPlayerStats {
    matches: Arc<dyn MatchRepository>,
    starting_rating: f64,
    stats: RwLock<HashMap<(Category, PlayerKey), PlayerCategoryStats>>,
}

impl InMemoryPlayerStats {
    pub fn new(matches: Arc<dyn MatchRepository>, starting_rating: f64) -> Self {
        Self {
            matches,
            starting_rating,
            stats: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(
        &self,
        player_key: &PlayerKey,
        category: &str,
    ) -> Result<Option<PlayerCategoryStats>> {
        let stats = self
            .stats
            .read()
            .map_err(|_| LedgerError::persistence("Failed to acquire stats read lock"))?;
        Ok(stats
            .get(&(category.to_string(), player_key.clone()))
            .cloned())
    }
}

#[async_trait]
impl PlayerStatsService for InMemoryPlayerStats {
    async fn recompute_after_match(&self, match_id: &MatchId) -> Result<()> {
        let game = self.matches.get(match_id).await?;
        let mut history = self
            .matches
            .list(&MatchFilter::completed(game.category.clone()))
            .await?;
        sort_chronologically(&mut history);

        let mut fresh = HashMap::new();
        for player_key in game.player_keys() {
            let mut record = PlayerCategoryStats::new(
                player_key.clone(),
                game.category.clone(),
                self.starting_rating,
            );
            let mut peak: Option<f64> = None;

            // Only rated appearances count
            for played in history.iter().filter(|m| m.is_rateable()) {
                let Some(participant) = played.participant(player_key) else {
                    continue;
                };
                let Some(snapshot) = participant.rating_snapshot else {
                    continue;
                };
                record.games_played += 1;
                match participant.outcome {
                    Outcome::Win => record.wins += 1,
                    Outcome::Loss => record.losses += 1,
                    Outcome::Draw => record.draws += 1,
                }
                record.score = snapshot.after;
                peak = Some(peak.map_or(snapshot.after, |p: f64| p.max(snapshot.after)));
                record.last_played = played.datetime;
            }
            record.peak_score = peak.unwrap_or(self.starting_rating);

            fresh.insert((game.category.clone(), player_key.clone()), record);
        }

        let mut stats = self
            .stats
            .write()
            .map_err(|_| LedgerError::persistence("Failed to acquire stats write lock"))?;
        let updated = fresh.len();
        stats.extend(fresh);
        debug!(match_id = %match_id, players = updated, "Player stats recomputed");

        Ok(())
    }
}
