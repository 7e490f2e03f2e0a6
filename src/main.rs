//! Command-line entry point for the ELO rating ledger
//!
//! Loads a JSON match history, rates it in chronological order, optionally
//! recalculates from a corrected match, audits every category's rating chain
//! and prints a JSON summary. Exits non-zero when a chain is broken.

use anyhow::{Context, Result};
use clap::Parser;
use elo_ledger::config::{validate_config, AppConfig};
use elo_ledger::ledger::{verify_chain, ApplyResult, CancellationFlag, ChainAudit, RatingEngine};
use elo_ledger::metrics::LedgerMetrics;
use elo_ledger::stats::InMemoryPlayerStats;
use elo_ledger::types::{Category, Match, PlayerKey, RecalculationReport};
use elo_ledger::utils::sort_chronologically;
use elo_ledger::InMemoryLedger;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

/// ELO rating ledger - rate a match history and replay corrections
#[derive(Parser)]
#[command(
    name = "elo-ledger",
    version,
    about = "Rate a match history with team ELO and recalculate from corrected matches",
    long_about = "elo-ledger reads a JSON array of matches, applies every rateable match in \
                 (datetime, id) order, optionally recalculates a category from a corrected \
                 match and verifies that every player's rating chain links up."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// Match history to rate
    #[arg(long, value_name = "FILE", help = "JSON file holding an array of matches")]
    history: Option<PathBuf>,

    /// Recalculate from this match after rating the history
    #[arg(long, value_name = "MATCH_ID")]
    recalculate_from: Option<String>,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Dry run mode (validate config and exit)
    #[arg(long, help = "Validate configuration and exit without rating anything")]
    dry_run: bool,
}

#[derive(Debug, Serialize)]
struct PlayerRating {
    player_key: PlayerKey,
    score: f64,
}

#[derive(Debug, Default, Serialize)]
struct RunSummary {
    matches_loaded: usize,
    matches_applied: usize,
    matches_skipped: usize,
    recalculation: Option<RecalculationReport>,
    ratings: BTreeMap<Category, Vec<PlayerRating>>,
    audits: Vec<ChainAudit>,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Load configuration from file or environment and apply CLI overrides
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    validate_config(&config)?;
    Ok(config)
}

/// Parse a JSON array of matches; entries without a category are placed in
/// `default_category`
fn load_history(path: &Path, default_category: &str) -> Result<Vec<Match>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read match history {}", path.display()))?;
    let mut raw: Vec<serde_json::Value> = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse match history {}", path.display()))?;
    for entry in &mut raw {
        if let Some(fields) = entry.as_object_mut() {
            fields
                .entry("category")
                .or_insert_with(|| serde_json::Value::from(default_category));
        }
    }
    let mut matches: Vec<Match> = serde_json::from_value(serde_json::Value::Array(raw))
        .with_context(|| format!("Invalid match in history {}", path.display()))?;

    // Ratings are rebuilt from scratch
    for game in &mut matches {
        for participant in &mut game.participants {
            participant.rating_snapshot = None;
        }
    }
    Ok(matches)
}

/// Raise the flag on Ctrl+C so a running recalculation stops between matches
fn cancel_on_interrupt(flag: CancellationFlag) {
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Received SIGINT (Ctrl+C), cancelling recalculation");
            flag.cancel();
        }
    });
}

async fn run(config: &AppConfig, args: &Args, history_path: &Path) -> Result<RunSummary> {
    let mut history = load_history(history_path, &config.rating.default_category)?;
    sort_chronologically(&mut history);
    let order: Vec<String> = history.iter().map(|game| game.id.clone()).collect();

    let ledger = Arc::new(InMemoryLedger::with_matches(history)?);
    let stats = Arc::new(InMemoryPlayerStats::new(
        ledger.clone(),
        config.rating.starting_rating,
    ));
    let metrics = Arc::new(LedgerMetrics::new()?);
    let engine = RatingEngine::new(config, ledger.clone(), ledger.clone(), stats, metrics);

    let mut summary = RunSummary {
        matches_loaded: order.len(),
        ..RunSummary::default()
    };

    for match_id in &order {
        match engine.apply_outcome(match_id).await? {
            ApplyResult::Applied { .. } => summary.matches_applied += 1,
            ApplyResult::Skipped { .. } => summary.matches_skipped += 1,
        }
    }
    info!(
        applied = summary.matches_applied,
        skipped = summary.matches_skipped,
        "Match history rated"
    );

    if let Some(target) = &args.recalculate_from {
        let cancel = CancellationFlag::new();
        cancel_on_interrupt(cancel.clone());
        summary.recalculation = Some(
            engine
                .recalculate_from_with_cancel(target, &cancel)
                .await?,
        );
    }

    for category in ledger.categories()? {
        let ratings = ledger
            .ratings_in_category(&category)?
            .into_iter()
            .map(|(player_key, score)| PlayerRating { player_key, score })
            .collect();
        summary.ratings.insert(category.clone(), ratings);
        summary.audits.push(verify_chain(ledger.as_ref(), &category).await?);
    }

    Ok(summary)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    info!(
        service = %config.service.name,
        starting_rating = config.rating.starting_rating,
        k_factor = config.rating.k_factor,
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run completed - configuration is valid");
        return Ok(());
    }

    let Some(history_path) = args.history.clone() else {
        eprintln!("--history is required unless --dry-run is given");
        std::process::exit(2);
    };

    let summary = match run(&config, &args, &history_path).await {
        Ok(summary) => summary,
        Err(e) => {
            error!("Rating run failed: {:#}", e);
            std::process::exit(1);
        }
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);

    let broken: usize = summary.audits.iter().map(|audit| audit.breaks.len()).sum();
    if broken > 0 {
        error!(breaks = broken, "Rating chain inconsistent");
        std::process::exit(1);
    }

    Ok(())
}
