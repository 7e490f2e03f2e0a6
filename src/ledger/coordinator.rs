//! Recalculation of a category's rating chain from a corrected match onward
//!
//! A run walks through a fixed sequence of phases:
//!
//! 1. `ValidatingTarget` - the target must be a rateable completed match
//!    with distinct, non-empty player keys
//! 2. `CollectingAffectedPlayers` - everyone in the target or any later match
//! 3. `ComputingPriorState` - each player's rating just before the target
//! 4. `RollingBack` - current ratings reset to those prior values
//! 5. `ReplayingForward` - every match from the target on is re-applied in
//!    `(datetime, id)` order
//!
//! Any failure ends the run in `Failed`. A failure during replay leaves the
//! category partly recomputed and is reported as
//! [`LedgerError::PartialRecalculation`]; the recovery path is to run the
//! whole recalculation again from the same target.

use crate::error::{LedgerError, Result};
use crate::ledger::applier::{validate_participants, MatchOutcomeApplier};
use crate::rating::storage::{MatchFilter, MatchRepository, RatingLedgerStore};
use crate::types::{Match, MatchId, PlayerKey, RecalculationReport};
use crate::utils::{generate_run_id, sort_chronologically};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Cooperative cancellation signal, checked between replayed matches
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Where a recalculation run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecalculationPhase {
    ValidatingTarget,
    CollectingAffectedPlayers,
    ComputingPriorState,
    RollingBack,
    ReplayingForward,
    Done,
    Failed,
}

impl std::fmt::Display for RecalculationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecalculationPhase::ValidatingTarget => write!(f, "validating_target"),
            RecalculationPhase::CollectingAffectedPlayers => write!(f, "collecting_affected_players"),
            RecalculationPhase::ComputingPriorState => write!(f, "computing_prior_state"),
            RecalculationPhase::RollingBack => write!(f, "rolling_back"),
            RecalculationPhase::ReplayingForward => write!(f, "replaying_forward"),
            RecalculationPhase::Done => write!(f, "done"),
            RecalculationPhase::Failed => write!(f, "failed"),
        }
    }
}

/// Phase bookkeeping of a single run
struct RunState {
    run_id: Uuid,
    target_id: MatchId,
    phase: RecalculationPhase,
}

impl RunState {
    fn enter(&mut self, phase: RecalculationPhase) {
        debug!(
            run_id = %self.run_id,
            match_id = %self.target_id,
            from = %self.phase,
            to = %phase,
            "Recalculation phase change"
        );
        self.phase = phase;
    }
}

/// Rolls a category back to just before a match and replays its tail
pub struct RecalculationCoordinator {
    matches: Arc<dyn MatchRepository>,
    store: Arc<dyn RatingLedgerStore>,
    applier: Arc<MatchOutcomeApplier>,
}

impl RecalculationCoordinator {
    pub fn new(
        matches: Arc<dyn MatchRepository>,
        store: Arc<dyn RatingLedgerStore>,
        applier: Arc<MatchOutcomeApplier>,
    ) -> Self {
        Self {
            matches,
            store,
            applier,
        }
    }

    /// Recompute every rating that depends on `target_id`.
    ///
    /// Callers must keep other writers out of the target's category for the
    /// duration of the call.
    pub async fn recalculate_from(
        &self,
        target_id: &MatchId,
        cancel: &CancellationFlag,
    ) -> Result<RecalculationReport> {
        let mut run = RunState {
            run_id: generate_run_id(),
            target_id: target_id.clone(),
            phase: RecalculationPhase::ValidatingTarget,
        };
        info!(run_id = %run.run_id, match_id = %target_id, "Recalculating ratings from match");

        match self.run(&mut run, cancel).await {
            Ok(report) => {
                run.enter(RecalculationPhase::Done);
                info!(
                    run_id = %run.run_id,
                    match_id = %target_id,
                    category = %report.category,
                    matches_replayed = report.matches_replayed,
                    players_affected = report.players_affected,
                    "Recalculation completed"
                );
                Ok(report)
            }
            Err(e) => {
                let failed_in = run.phase;
                run.enter(RecalculationPhase::Failed);
                error!(
                    run_id = %run.run_id,
                    match_id = %target_id,
                    phase = %failed_in,
                    error = %e,
                    "Recalculation failed, ratings may be inconsistent until retried"
                );
                Err(e)
            }
        }
    }

    async fn run(&self, run: &mut RunState, cancel: &CancellationFlag) -> Result<RecalculationReport> {
        let target = self.matches.get(&run.target_id).await?;
        if let Some(reason) = target.ineligibility_reason() {
            return Err(LedgerError::validation(reason));
        }
        validate_participants(&target)?;
        let target_time = target
            .datetime
            .ok_or_else(|| LedgerError::validation(format!("match {} has no datetime", target.id)))?;
        let category = target.category.clone();

        run.enter(RecalculationPhase::CollectingAffectedPlayers);
        let tail = self.load_tail(&target, target_time).await?;
        let affected: BTreeSet<PlayerKey> = tail
            .iter()
            .flat_map(|game| game.player_keys().cloned())
            .collect();
        debug!(
            match_id = %target.id,
            tail = tail.len(),
            players = affected.len(),
            "Affected players collected"
        );

        run.enter(RecalculationPhase::ComputingPriorState);
        let mut prior = Vec::with_capacity(affected.len());
        for player_key in &affected {
            let rating = self.prior_rating(player_key, &category, target_time).await?;
            prior.push((player_key.clone(), rating));
        }

        run.enter(RecalculationPhase::RollingBack);
        self.store.set_ratings(&category, &prior).await?;

        run.enter(RecalculationPhase::ReplayingForward);
        let mut replayed: Vec<MatchId> = Vec::with_capacity(tail.len());
        for (index, game) in tail.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(partial_failure(
                    &replayed,
                    &tail[index..],
                    LedgerError::Cancelled {
                        message: format!("recalculation from {} cancelled", run.target_id),
                    },
                ));
            }

            if let Err(e) = self.applier.apply(game).await {
                return Err(partial_failure(&replayed, &tail[index..], e));
            }
            debug!(
                run_id = %run.run_id,
                match_id = %game.id,
                position = index + 1,
                total = tail.len(),
                "Replayed match"
            );
            replayed.push(game.id.clone());
        }

        Ok(RecalculationReport {
            run_id: run.run_id,
            target_match_id: target.id.clone(),
            category,
            matches_replayed: replayed.len(),
            players_affected: affected.len(),
            replayed_match_ids: replayed,
        })
    }

    /// Rateable completed matches of the category at or after the target,
    /// target included, in replay order
    async fn load_tail(&self, target: &Match, since: DateTime<Utc>) -> Result<Vec<Match>> {
        let filter = MatchFilter::completed(target.category.clone()).since(since);
        let mut tail: Vec<Match> = self
            .matches
            .list(&filter)
            .await?
            .into_iter()
            .filter(|game| game.is_rateable())
            .collect();
        if !tail.iter().any(|game| game.id == target.id) {
            tail.push(target.clone());
        }
        sort_chronologically(&mut tail);
        Ok(tail)
    }

    /// Rating of `player_key` after its last match strictly before `before`
    async fn prior_rating(
        &self,
        player_key: &PlayerKey,
        category: &str,
        before: DateTime<Utc>,
    ) -> Result<f64> {
        let previous = self
            .matches
            .most_recent_completed_before(player_key, category, before)
            .await?;

        match previous {
            None => Ok(self.applier.calculator().starting_rating()),
            Some(game) => game
                .participant(player_key)
                .and_then(|p| p.rating_snapshot)
                .map(|snapshot| snapshot.after)
                .ok_or_else(|| {
                    LedgerError::not_found(format!(
                        "rating snapshot of {} in match {}",
                        player_key, game.id
                    ))
                }),
        }
    }
}

fn partial_failure(replayed: &[MatchId], remaining: &[Match], source: LedgerError) -> LedgerError {
    LedgerError::PartialRecalculation {
        last_successful_match_id: replayed.last().cloned(),
        remaining_match_ids: remaining.iter().map(|game| game.id.clone()).collect(),
        source: Box::new(source),
    }
}
