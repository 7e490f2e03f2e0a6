//! Storage contracts for ratings and match history
//!
//! The engine is written against these traits only; the concrete backend is
//! chosen once when the process is wired together.

use crate::error::{LedgerError, Result};
use crate::types::{
    Category, Match, MatchId, MatchRatingUpdate, MatchState, PlayerKey, RatingSnapshot,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Query over stored matches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchFilter {
    pub category: Category,
    pub state: Option<MatchState>,
    /// Inclusive lower bound
    pub datetime_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound
    pub datetime_to: Option<DateTime<Utc>>,
}

impl MatchFilter {
    /// Completed matches of a category, any time
    pub fn completed(category: impl Into<Category>) -> Self {
        Self {
            category: category.into(),
            state: Some(MatchState::Completed),
            datetime_from: None,
            datetime_to: None,
        }
    }

    pub fn since(mut self, datetime: DateTime<Utc>) -> Self {
        self.datetime_from = Some(datetime);
        self
    }

    pub fn until(mut self, datetime: DateTime<Utc>) -> Self {
        self.datetime_to = Some(datetime);
        self
    }

    /// Whether a match satisfies this filter. Undated matches only pass when
    /// no time bound is set.
    pub fn matches(&self, game: &Match) -> bool {
        if game.category != self.category {
            return false;
        }
        if let Some(state) = self.state {
            if game.state != state {
                return false;
            }
        }
        if self.datetime_from.is_none() && self.datetime_to.is_none() {
            return true;
        }
        let Some(datetime) = game.datetime else {
            return false;
        };
        if let Some(from) = self.datetime_from {
            if datetime < from {
                return false;
            }
        }
        if let Some(to) = self.datetime_to {
            if datetime >= to {
                return false;
            }
        }
        true
    }
}

/// Read access to match history
#[async_trait]
pub trait MatchRepository: Send + Sync {
    /// Load one match; `NotFound` if it does not exist
    async fn get(&self, match_id: &MatchId) -> Result<Match>;

    /// All matches satisfying the filter, in no particular order
    async fn list(&self, filter: &MatchFilter) -> Result<Vec<Match>>;

    /// The latest rating-eligible completed match of `player_key` in
    /// `category` strictly before `before`, ordered by `(datetime, id)`
    async fn most_recent_completed_before(
        &self,
        player_key: &PlayerKey,
        category: &str,
        before: DateTime<Utc>,
    ) -> Result<Option<Match>> {
        let filter = MatchFilter::completed(category).until(before);
        let latest = self
            .list(&filter)
            .await?
            .into_iter()
            .filter(|game| game.is_rateable() && game.has_player(player_key))
            .max_by(|a, b| {
                a.datetime
                    .cmp(&b.datetime)
                    .then_with(|| a.id.cmp(&b.id))
            });

        Ok(latest)
    }
}

/// Read/write access to current ratings and per-match snapshots
#[async_trait]
pub trait RatingLedgerStore: Send + Sync {
    /// Current rating, `None` when the player has never been rated here
    async fn get_rating(&self, player_key: &PlayerKey, category: &str) -> Result<Option<f64>>;

    async fn set_rating(&self, player_key: &PlayerKey, category: &str, score: f64) -> Result<()>;

    /// Reset several ratings of one category. Stores that can do so should
    /// apply the whole batch atomically.
    async fn set_ratings(&self, category: &str, scores: &[(PlayerKey, f64)]) -> Result<()> {
        for (player_key, score) in scores {
            self.set_rating(player_key, category, *score).await?;
        }
        Ok(())
    }

    async fn write_snapshot(
        &self,
        match_id: &MatchId,
        player_key: &PlayerKey,
        snapshot: RatingSnapshot,
    ) -> Result<()>;

    /// Write every snapshot and rating of one match, all or nothing.
    ///
    /// Each write carries the rating value observed when it was computed;
    /// if any stored value differs the whole commit is rejected with
    /// [`LedgerError::Conflict`].
    async fn commit_match(&self, update: &MatchRatingUpdate) -> Result<()>;
}

/// Convenience for stores and repositories reporting a missing match
pub fn match_not_found(match_id: &MatchId) -> LedgerError {
    LedgerError::not_found(format!("match {}", match_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Outcome, Participant};
    use chrono::TimeZone;

    fn game_at(hour: u32) -> Match {
        Match {
            id: format!("m{}", hour),
            datetime: Some(Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()),
            category: "1v1".to_string(),
            state: MatchState::Completed,
            participants: vec![
                Participant::new("a", Outcome::Win),
                Participant::new("b", Outcome::Loss),
            ],
        }
    }

    #[test]
    fn test_filter_bounds() {
        let noon = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

        let from_noon = MatchFilter::completed("1v1").since(noon);
        assert!(from_noon.matches(&game_at(12)));
        assert!(!from_noon.matches(&game_at(11)));

        let until_noon = MatchFilter::completed("1v1").until(noon);
        assert!(!until_noon.matches(&game_at(12)));
        assert!(until_noon.matches(&game_at(11)));
    }

    #[test]
    fn test_filter_category_and_state() {
        let filter = MatchFilter::completed("2v2");
        assert!(!filter.matches(&game_at(10)));

        let mut scheduled = game_at(10);
        scheduled.state = MatchState::Scheduled;
        assert!(!MatchFilter::completed("1v1").matches(&scheduled));
    }

    #[test]
    fn test_undated_match_excluded_by_time_bounds() {
        let mut undated = game_at(10);
        undated.datetime = None;

        assert!(MatchFilter::completed("1v1").matches(&undated));
        assert!(!MatchFilter::completed("1v1")
            .since(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap())
            .matches(&undated));
    }
}
