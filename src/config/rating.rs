//! Rating system configuration

use crate::types::{Category, DEFAULT_CATEGORY};
use serde::{Deserialize, Serialize};

/// Rating assigned to a player with no history in a category
pub const STARTING_RATING: f64 = 1000.0;

/// Default sensitivity of a single match
pub const K_FACTOR: f64 = 32.0;

/// Parameters of the ELO formula
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingConfig {
    pub starting_rating: f64,
    pub k_factor: f64,
    /// Category assumed for matches that do not carry one
    pub default_category: Category,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            starting_rating: STARTING_RATING,
            k_factor: K_FACTOR,
            default_category: DEFAULT_CATEGORY.to_string(),
        }
    }
}
