//! ELO rating mathematics
//!
//! Pure, total functions over `f64`: nothing in here performs I/O or fails.
//! Every published rating change is rounded half away from zero to two
//! decimal places.

use crate::config::rating::{RatingConfig, K_FACTOR, STARTING_RATING};
use crate::types::Outcome;

/// Round half away from zero to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Probability that a player rated `rating` beats one rated `opponent`
pub fn expected_score(rating: f64, opponent: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf((opponent - rating) / 400.0))
}

/// Rating change for one match against `opponent_rating`
pub fn delta(player_rating: f64, opponent_rating: f64, outcome: Outcome, k_factor: f64) -> f64 {
    let expected = expected_score(player_rating, opponent_rating);
    round2(k_factor * (outcome.actual_score() - expected))
}

/// Mean rating of a team, falling back to `starting_rating` for an empty team
pub fn team_rating_with_default(ratings: &[f64], starting_rating: f64) -> f64 {
    if ratings.is_empty() {
        return starting_rating;
    }

    let sum: f64 = ratings.iter().sum();
    round2(sum / ratings.len() as f64)
}

/// Mean rating of a team using the standard starting rating for an empty team
pub fn team_rating(ratings: &[f64]) -> f64 {
    team_rating_with_default(ratings, STARTING_RATING)
}

/// Rating math bound to a particular configuration
#[derive(Debug, Clone)]
pub struct EloCalculator {
    config: RatingConfig,
}

impl EloCalculator {
    pub fn new(config: RatingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RatingConfig {
        &self.config
    }

    pub fn starting_rating(&self) -> f64 {
        self.config.starting_rating
    }

    pub fn k_factor(&self) -> f64 {
        self.config.k_factor
    }

    pub fn delta(&self, player_rating: f64, opponent_rating: f64, outcome: Outcome) -> f64 {
        delta(player_rating, opponent_rating, outcome, self.config.k_factor)
    }

    pub fn team_rating(&self, ratings: &[f64]) -> f64 {
        team_rating_with_default(ratings, self.config.starting_rating)
    }
}

impl Default for EloCalculator {
    fn default() -> Self {
        Self::new(RatingConfig::default())
    }
}
