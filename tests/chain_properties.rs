//! Property tests over random match histories
//!
//! Every history, rated in order and then corrected and recalculated, must
//! keep each player's snapshot chain linked and must end up exactly where a
//! rebuild of the corrected history from scratch ends up.

mod fixtures;

use elo_ledger::ledger::verify_chain;
use elo_ledger::rating::MatchRepository;
use elo_ledger::types::{Match, Outcome};
use elo_ledger::utils::sort_chronologically;
use proptest::prelude::*;

use fixtures::{completed, TestSystem};

const PLAYERS: [&str; 4] = ["ana", "bo", "cy", "dee"];

fn outcome_pair(code: u8) -> (Outcome, Outcome) {
    match code % 3 {
        0 => (Outcome::Win, Outcome::Loss),
        1 => (Outcome::Loss, Outcome::Win),
        _ => (Outcome::Draw, Outcome::Draw),
    }
}

/// (first player, offset to second player, outcome code, minute)
fn history_from(raw: &[(usize, usize, u8, i64)]) -> Vec<Match> {
    raw.iter()
        .enumerate()
        .map(|(index, (first, offset, code, minute))| {
            let second = (first + offset) % PLAYERS.len();
            let (a, b) = outcome_pair(*code);
            completed(
                &format!("m{:03}", index),
                *minute,
                &[(PLAYERS[*first], a), (PLAYERS[second], b)],
            )
        })
        .collect()
}

fn chronological_ids(history: &[Match]) -> Vec<String> {
    let mut sorted = history.to_vec();
    sort_chronologically(&mut sorted);
    sorted.into_iter().map(|game| game.id).collect()
}

async fn rate_in_order(history: Vec<Match>) -> TestSystem {
    let order = chronological_ids(&history);
    let system = TestSystem::new(history);
    for id in &order {
        system.engine.apply_outcome(id).await.unwrap();
    }
    system
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_rated_history_keeps_chain_linked(
        raw in prop::collection::vec((0usize..4, 1usize..4, 0u8..3, 0i64..20), 1..30)
    ) {
        runtime().block_on(async {
            let system = rate_in_order(history_from(&raw)).await;

            let audit = verify_chain(system.ledger.as_ref(), "default").await.unwrap();
            prop_assert!(audit.is_consistent(), "breaks: {:?}", audit.breaks);
            prop_assert_eq!(audit.matches_checked, raw.len());
            Ok(())
        })?;
    }

    #[test]
    fn prop_recalculation_matches_full_rebuild(
        raw in prop::collection::vec((0usize..4, 1usize..4, 0u8..3, 0i64..20), 1..30),
        pick in any::<prop::sample::Index>(),
        new_code in 0u8..3,
    ) {
        runtime().block_on(async {
            let mut history = history_from(&raw);
            let system = rate_in_order(history.clone()).await;

            // Correct one match's outcome
            let target = pick.index(history.len());
            let (a, b) = outcome_pair(new_code);
            history[target].participants[0].outcome = a;
            history[target].participants[1].outcome = b;
            let target_id = history[target].id.clone();

            let mut stored = system.ledger.get(&target_id).await.unwrap();
            stored.participants[0].outcome = a;
            stored.participants[1].outcome = b;
            system.correct(stored);

            system.engine.recalculate_from(&target_id).await.unwrap();
            let audit = verify_chain(system.ledger.as_ref(), "default").await.unwrap();
            prop_assert!(audit.is_consistent(), "breaks: {:?}", audit.breaks);

            let rebuilt = rate_in_order(history).await;
            prop_assert_eq!(
                system.ledger.ratings_in_category("default").unwrap(),
                rebuilt.ledger.ratings_in_category("default").unwrap()
            );

            // Running it again changes nothing
            let settled = system.ledger.ratings_in_category("default").unwrap();
            system.engine.recalculate_from(&target_id).await.unwrap();
            prop_assert_eq!(system.ledger.ratings_in_category("default").unwrap(), settled);
            Ok(())
        })?;
    }
}
