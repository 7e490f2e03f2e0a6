//! Entry point for every rating write
//!
//! `RatingEngine` owns the per-category locks, so single-match application
//! and recalculation of the same category never interleave. Conflicting
//! commits of single matches are retried with backoff; a recalculation is
//! never retried automatically.

use crate::config::app::AppConfig;
use crate::error::Result;
use crate::ledger::applier::{ApplyResult, MatchOutcomeApplier};
use crate::ledger::coordinator::{CancellationFlag, RecalculationCoordinator};
use crate::ledger::locks::CategoryLocks;
use crate::ledger::retry::{retry_on_conflict, RetryPolicy};
use crate::metrics::LedgerMetrics;
use crate::rating::elo::EloCalculator;
use crate::rating::storage::{MatchRepository, RatingLedgerStore};
use crate::stats::PlayerStatsService;
use crate::types::{MatchId, RecalculationReport};
use std::sync::Arc;
use tracing::{debug, info};

pub struct RatingEngine {
    matches: Arc<dyn MatchRepository>,
    applier: Arc<MatchOutcomeApplier>,
    coordinator: RecalculationCoordinator,
    locks: CategoryLocks,
    retry: RetryPolicy,
    metrics: Arc<LedgerMetrics>,
}

impl RatingEngine {
    pub fn new(
        config: &AppConfig,
        matches: Arc<dyn MatchRepository>,
        store: Arc<dyn RatingLedgerStore>,
        stats: Arc<dyn PlayerStatsService>,
        metrics: Arc<LedgerMetrics>,
    ) -> Self {
        let applier = Arc::new(MatchOutcomeApplier::new(
            store.clone(),
            stats,
            EloCalculator::new(config.rating.clone()),
        ));
        let coordinator = RecalculationCoordinator::new(matches.clone(), store, applier.clone());

        Self {
            matches,
            applier,
            coordinator,
            locks: CategoryLocks::new(),
            retry: RetryPolicy::from(&config.retry),
            metrics,
        }
    }

    /// Replace the conflict retry policy
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn metrics(&self) -> Arc<LedgerMetrics> {
        self.metrics.clone()
    }

    pub fn calculator(&self) -> &EloCalculator {
        self.applier.calculator()
    }

    /// Rate a completed match against the current ratings of its category.
    ///
    /// The match is reloaded on every attempt, so a retry after a conflict
    /// sees both the latest match record and the latest ratings.
    pub async fn apply_outcome(&self, match_id: &MatchId) -> Result<ApplyResult> {
        let timer = self.metrics.start_timer();
        let category = self.matches.get(match_id).await?.category;

        let _guard = self.locks.acquire(&category).await?;
        debug!(match_id = %match_id, category = %category, "Category lock acquired");

        let matches = &self.matches;
        let applier = &self.applier;
        let metrics = &self.metrics;
        let result = retry_on_conflict(
            &self.retry,
            || metrics.record_conflict(),
            move || async move {
                let game = matches.get(match_id).await?;
                applier.apply(&game).await
            },
        )
        .await?;

        self.metrics.record_apply(&category, &result, timer.stop());
        Ok(result)
    }

    /// Recompute every rating downstream of `match_id`
    pub async fn recalculate_from(&self, match_id: &MatchId) -> Result<RecalculationReport> {
        self.recalculate_from_with_cancel(match_id, &CancellationFlag::new())
            .await
    }

    /// Like [`recalculate_from`](Self::recalculate_from), stopping between
    /// replayed matches once `cancel` is raised.
    pub async fn recalculate_from_with_cancel(
        &self,
        match_id: &MatchId,
        cancel: &CancellationFlag,
    ) -> Result<RecalculationReport> {
        let timer = self.metrics.start_timer();
        let category = self.matches.get(match_id).await?.category;

        let _guard = self.locks.acquire(&category).await?;
        info!(match_id = %match_id, category = %category, "Category locked for recalculation");

        let result = self.coordinator.recalculate_from(match_id, cancel).await;
        self.metrics.record_recalculation(&result, timer.stop());
        result
    }
}
