//! Test fixtures and failure-injecting collaborators for integration testing

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use elo_ledger::config::AppConfig;
use elo_ledger::error::{LedgerError, Result};
use elo_ledger::ledger::{RatingEngine, RetryPolicy};
use elo_ledger::metrics::LedgerMetrics;
use elo_ledger::rating::{InMemoryLedger, MatchRepository, RatingLedgerStore};
use elo_ledger::stats::PlayerStatsService;
use elo_ledger::types::{
    Match, MatchId, MatchRatingUpdate, MatchState, Outcome, Participant, PlayerKey, RatingSnapshot,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Fixed test clock: 2024-03-01 plus `minutes`
pub fn at(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() + chrono::Duration::minutes(minutes)
}

/// Completed match in the default category
pub fn completed(id: &str, minutes: i64, participants: &[(&str, Outcome)]) -> Match {
    Match {
        id: id.to_string(),
        datetime: Some(at(minutes)),
        category: "default".to_string(),
        state: MatchState::Completed,
        participants: participants
            .iter()
            .map(|(name, outcome)| Participant::new(name, *outcome))
            .collect(),
    }
}

/// One-on-one completed match won by `winner`
pub fn duel(id: &str, minutes: i64, winner: &str, loser: &str) -> Match {
    completed(id, minutes, &[(winner, Outcome::Win), (loser, Outcome::Loss)])
}

pub fn in_category(mut game: Match, category: &str) -> Match {
    game.category = category.to_string();
    game
}

pub fn snapshot(ledger: &InMemoryLedger, match_id: &str, player: &str) -> RatingSnapshot {
    futures::executor::block_on(ledger.get(&match_id.to_string()))
        .unwrap()
        .participant(&PlayerKey::new(player))
        .and_then(|p| p.rating_snapshot)
        .unwrap_or_else(|| panic!("no snapshot for {} in {}", player, match_id))
}

pub fn rating(ledger: &InMemoryLedger, player: &str, category: &str) -> Option<f64> {
    futures::executor::block_on(ledger.get_rating(&PlayerKey::new(player), category)).unwrap()
}

pub fn approx(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {} but got {}",
        expected,
        actual
    );
}

pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(2),
    }
}

/// Rating store delegating to an [`InMemoryLedger`] that can be told to fail
#[derive(Default)]
pub struct FlakyStore {
    inner: Arc<InMemoryLedger>,
    fail_commit_for: Mutex<Option<MatchId>>,
    conflicts_remaining: AtomicU32,
    commits: AtomicU32,
}

impl FlakyStore {
    pub fn new(inner: Arc<InMemoryLedger>) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    /// Fail every commit of `match_id` with a persistence error
    pub fn fail_commit_for(&self, match_id: &str) {
        *self.fail_commit_for.lock().unwrap() = Some(match_id.to_string());
    }

    pub fn heal(&self) {
        *self.fail_commit_for.lock().unwrap() = None;
    }

    /// Reject the next `count` commits as conflicting
    pub fn conflict_next(&self, count: u32) {
        self.conflicts_remaining.store(count, Ordering::SeqCst);
    }

    /// Commits that reached the underlying ledger
    pub fn commits(&self) -> u32 {
        self.commits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RatingLedgerStore for FlakyStore {
    async fn get_rating(&self, player_key: &PlayerKey, category: &str) -> Result<Option<f64>> {
        self.inner.get_rating(player_key, category).await
    }

    async fn set_rating(&self, player_key: &PlayerKey, category: &str, score: f64) -> Result<()> {
        self.inner.set_rating(player_key, category, score).await
    }

    async fn set_ratings(&self, category: &str, scores: &[(PlayerKey, f64)]) -> Result<()> {
        self.inner.set_ratings(category, scores).await
    }

    async fn write_snapshot(
        &self,
        match_id: &MatchId,
        player_key: &PlayerKey,
        snapshot: RatingSnapshot,
    ) -> Result<()> {
        self.inner.write_snapshot(match_id, player_key, snapshot).await
    }

    async fn commit_match(&self, update: &MatchRatingUpdate) -> Result<()> {
        let failing = self.fail_commit_for.lock().unwrap().clone();
        if failing.as_deref() == Some(update.match_id.as_str()) {
            return Err(LedgerError::persistence(format!(
                "injected failure committing {}",
                update.match_id
            )));
        }

        let pending = self.conflicts_remaining.load(Ordering::SeqCst);
        if pending > 0 {
            self.conflicts_remaining.store(pending - 1, Ordering::SeqCst);
            return Err(LedgerError::conflict("injected concurrent write"));
        }

        self.commits.fetch_add(1, Ordering::SeqCst);
        self.inner.commit_match(update).await
    }
}

/// Stats service remembering every notification it received
#[derive(Default)]
pub struct RecordingStats {
    notified: Mutex<Vec<MatchId>>,
}

impl RecordingStats {
    pub fn notified(&self) -> Vec<MatchId> {
        self.notified.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlayerStatsService for RecordingStats {
    async fn recompute_after_match(&self, match_id: &MatchId) -> Result<()> {
        self.notified.lock().unwrap().push(match_id.clone());
        Ok(())
    }
}

/// A ledger, a flaky view of it and an engine writing through that view
pub struct TestSystem {
    pub ledger: Arc<InMemoryLedger>,
    pub store: Arc<FlakyStore>,
    pub stats: Arc<RecordingStats>,
    pub engine: RatingEngine,
}

impl TestSystem {
    pub fn new(matches: Vec<Match>) -> Self {
        let ledger = Arc::new(InMemoryLedger::with_matches(matches).unwrap());
        let store = Arc::new(FlakyStore::new(ledger.clone()));
        let stats = Arc::new(RecordingStats::default());
        let engine = RatingEngine::new(
            &AppConfig::default(),
            ledger.clone(),
            store.clone(),
            stats.clone(),
            Arc::new(LedgerMetrics::new().unwrap()),
        )
        .with_retry_policy(fast_retry(5));

        Self {
            ledger,
            store,
            stats,
            engine,
        }
    }

    /// Apply matches one by one, in the given order
    pub async fn apply(&self, ids: &[&str]) {
        for id in ids {
            self.engine.apply_outcome(&id.to_string()).await.unwrap();
        }
    }

    /// Replace a stored match, e.g. to correct its outcome
    pub fn correct(&self, game: Match) {
        self.ledger.insert_match(game).unwrap();
    }
}
