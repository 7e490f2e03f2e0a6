//! Performance benchmarks for rating calculations and recalculation

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use elo_ledger::config::AppConfig;
use elo_ledger::ledger::RatingEngine;
use elo_ledger::metrics::LedgerMetrics;
use elo_ledger::rating::{delta, team_rating, InMemoryLedger};
use elo_ledger::stats::NoOpPlayerStatsService;
use elo_ledger::types::{Match, MatchState, Outcome, Participant};
use std::sync::Arc;

const PLAYERS: usize = 16;

fn bench_history(len: usize) -> Vec<Match> {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    (0..len)
        .map(|i| Match {
            id: format!("m{:05}", i),
            datetime: Some(start + chrono::Duration::minutes(i as i64)),
            category: "default".to_string(),
            state: MatchState::Completed,
            participants: vec![
                Participant::new(&format!("player{}", i % PLAYERS), Outcome::Win),
                Participant::new(&format!("player{}", (i * 7 + 3) % PLAYERS + PLAYERS), Outcome::Loss),
            ],
        })
        .collect()
}

fn bench_engine(history: Vec<Match>) -> (RatingEngine, Vec<String>) {
    let ids = history.iter().map(|game| game.id.clone()).collect();
    let ledger = Arc::new(InMemoryLedger::with_matches(history).unwrap());
    let engine = RatingEngine::new(
        &AppConfig::default(),
        ledger.clone(),
        ledger,
        Arc::new(NoOpPlayerStatsService),
        Arc::new(LedgerMetrics::new().unwrap()),
    );
    (engine, ids)
}

fn bench_rating_calculations(c: &mut Criterion) {
    let team = [1016.0, 984.0, 1032.5, 1001.47];

    c.bench_function("elo_delta", |b| {
        b.iter(|| black_box(delta(black_box(1016.0), black_box(984.0), Outcome::Win, 32.0)))
    });

    c.bench_function("team_rating_4_players", |b| {
        b.iter(|| black_box(team_rating(black_box(&team))))
    });
}

fn bench_apply_history(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("apply_200_matches", |b| {
        b.iter(|| {
            rt.block_on(async {
                let (engine, ids) = bench_engine(bench_history(200));
                for id in &ids {
                    engine.apply_outcome(id).await.unwrap();
                }
                black_box(ids.len())
            })
        })
    });
}

fn bench_recalculation(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (engine, ids) = bench_engine(bench_history(500));
    rt.block_on(async {
        for id in &ids {
            engine.apply_outcome(id).await.unwrap();
        }
    });

    c.bench_function("recalculate_500_from_first", |b| {
        b.iter(|| rt.block_on(async { black_box(engine.recalculate_from(&ids[0]).await.unwrap()) }))
    });

    c.bench_function("recalculate_500_from_middle", |b| {
        b.iter(|| rt.block_on(async { black_box(engine.recalculate_from(&ids[250]).await.unwrap()) }))
    });
}

criterion_group!(
    benches,
    bench_rating_calculations,
    bench_apply_history,
    bench_recalculation
);
criterion_main!(benches);
