//! Common types used throughout the rating ledger

use crate::utils::normalize_player_name;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for matches
pub type MatchId = String;

/// Independent rating namespace (e.g. a game mode)
pub type Category = String;

/// Category used when a match does not name one
pub const DEFAULT_CATEGORY: &str = "default";

fn default_category() -> Category {
    DEFAULT_CATEGORY.to_string()
}

/// Normalized (lower-cased, trimmed) player name used for every rating lookup
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct PlayerKey(String);

impl PlayerKey {
    pub fn new(raw: &str) -> Self {
        Self(normalize_player_name(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for PlayerKey {
    fn from(raw: String) -> Self {
        Self::new(&raw)
    }
}

impl From<&str> for PlayerKey {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<PlayerKey> for String {
    fn from(key: PlayerKey) -> Self {
        key.0
    }
}

impl std::fmt::Display for PlayerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchState {
    Scheduled,
    Completed,
    Cancelled,
}

impl std::fmt::Display for MatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchState::Scheduled => write!(f, "scheduled"),
            MatchState::Completed => write!(f, "completed"),
            MatchState::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Result of a match for one participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Win,
    Loss,
    Draw,
}

impl Outcome {
    /// Actual score used by the ELO formula
    pub fn actual_score(self) -> f64 {
        match self {
            Outcome::Win => 1.0,
            Outcome::Loss => 0.0,
            Outcome::Draw => 0.5,
        }
    }
}

/// Durable audit record of a participant's rating around one match
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingSnapshot {
    pub before: f64,
    pub change: f64,
    pub after: f64,
}

impl RatingSnapshot {
    pub fn new(before: f64, change: f64) -> Self {
        Self {
            before,
            change,
            after: before + change,
        }
    }
}

/// A player taking part in a match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub player_key: PlayerKey,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating_snapshot: Option<RatingSnapshot>,
}

impl Participant {
    pub fn new(name: &str, outcome: Outcome) -> Self {
        Self {
            player_key: PlayerKey::new(name),
            outcome,
            rating_snapshot: None,
        }
    }
}

/// A match as seen by the ledger; timestamps are already normalized to UTC
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    #[serde(default)]
    pub datetime: Option<DateTime<Utc>>,
    #[serde(default = "default_category")]
    pub category: Category,
    pub state: MatchState,
    pub participants: Vec<Participant>,
}

impl Match {
    /// Why this match cannot be rated, if it cannot
    pub fn ineligibility_reason(&self) -> Option<String> {
        if self.state != MatchState::Completed {
            return Some(format!("match {} is {}, not completed", self.id, self.state));
        }
        if self.datetime.is_none() {
            return Some(format!("match {} has no datetime", self.id));
        }
        if self.participants.len() < 2 {
            return Some(format!(
                "match {} has {} participant(s), at least 2 required",
                self.id,
                self.participants.len()
            ));
        }
        None
    }

    /// Completed, timestamped and with at least two participants
    pub fn is_rateable(&self) -> bool {
        self.ineligibility_reason().is_none()
    }

    pub fn participant(&self, player_key: &PlayerKey) -> Option<&Participant> {
        self.participants
            .iter()
            .find(|p| &p.player_key == player_key)
    }

    pub fn participant_mut(&mut self, player_key: &PlayerKey) -> Option<&mut Participant> {
        self.participants
            .iter_mut()
            .find(|p| &p.player_key == player_key)
    }

    pub fn player_keys(&self) -> impl Iterator<Item = &PlayerKey> {
        self.participants.iter().map(|p| &p.player_key)
    }

    pub fn has_player(&self, player_key: &PlayerKey) -> bool {
        self.participant(player_key).is_some()
    }
}

/// Current rating of one player in one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingState {
    pub category: Category,
    pub score: f64,
}

/// One participant's share of an atomic match commit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingWrite {
    pub player_key: PlayerKey,
    /// Stored rating observed when `snapshot.before` was read; `None` if absent
    pub expected_current: Option<f64>,
    pub snapshot: RatingSnapshot,
}

/// Every write produced by rating a single match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRatingUpdate {
    pub match_id: MatchId,
    pub category: Category,
    pub writes: Vec<RatingWrite>,
}

/// Summary of a completed recalculation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecalculationReport {
    pub run_id: Uuid,
    pub target_match_id: MatchId,
    pub category: Category,
    pub matches_replayed: usize,
    pub players_affected: usize,
    /// Replay order, earliest first
    pub replayed_match_ids: Vec<MatchId>,
}
