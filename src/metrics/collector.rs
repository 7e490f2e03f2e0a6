//! Metrics collection using Prometheus
//!
//! Counters and histograms for rating writes and recalculation runs.

use crate::error::LedgerError;
use crate::ledger::applier::ApplyResult;
use crate::types::RecalculationReport;
use anyhow::Result;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the rating ledger
#[derive(Clone)]
pub struct LedgerMetrics {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Single-match writes
    write_metrics: WriteMetrics,

    /// Recalculation runs
    recalculation_metrics: RecalculationMetrics,
}

/// Metrics of single-match rating writes
#[derive(Clone)]
pub struct WriteMetrics {
    /// Matches whose ratings were committed, by category
    pub matches_applied_total: IntCounterVec,

    /// Matches handed to the ledger but not eligible for rating
    pub matches_skipped_total: IntCounter,

    /// Commits rejected because a rating changed underneath
    pub conflicts_total: IntCounter,

    /// Time to apply one match, retries included
    pub apply_duration: Histogram,
}

/// Metrics of recalculation runs
#[derive(Clone)]
pub struct RecalculationMetrics {
    /// Runs by result (success, failed, cancelled)
    pub recalculations_total: IntCounterVec,

    /// Matches re-applied by successful runs
    pub matches_replayed_total: IntCounter,

    /// Wall time of a run
    pub recalculation_duration: Histogram,
}

impl LedgerMetrics {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let write_metrics = WriteMetrics::new(&registry)?;
        let recalculation_metrics = RecalculationMetrics::new(&registry)?;

        Ok(Self {
            registry,
            write_metrics,
            recalculation_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn writes(&self) -> &WriteMetrics {
        &self.write_metrics
    }

    pub fn recalculations(&self) -> &RecalculationMetrics {
        &self.recalculation_metrics
    }

    /// Record the result of applying one match
    pub fn record_apply(&self, category: &str, result: &ApplyResult, duration: Duration) {
        match result {
            ApplyResult::Applied { .. } => self
                .write_metrics
                .matches_applied_total
                .with_label_values(&[category])
                .inc(),
            ApplyResult::Skipped { .. } => self.write_metrics.matches_skipped_total.inc(),
        }

        self.write_metrics
            .apply_duration
            .observe(duration.as_secs_f64());
    }

    /// Record one conflicting commit
    pub fn record_conflict(&self) {
        self.write_metrics.conflicts_total.inc();
    }

    /// Record the outcome of a recalculation run
    pub fn record_recalculation(
        &self,
        result: &std::result::Result<RecalculationReport, LedgerError>,
        duration: Duration,
    ) {
        let status = match result {
            Ok(report) => {
                self.recalculation_metrics
                    .matches_replayed_total
                    .inc_by(report.matches_replayed as u64);
                "success"
            }
            Err(e) if is_cancellation(e) => "cancelled",
            Err(_) => "failed",
        };

        self.recalculation_metrics
            .recalculations_total
            .with_label_values(&[status])
            .inc();

        self.recalculation_metrics
            .recalculation_duration
            .observe(duration.as_secs_f64());
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

fn is_cancellation(error: &LedgerError) -> bool {
    match error {
        LedgerError::Cancelled { .. } => true,
        LedgerError::PartialRecalculation { source, .. } => is_cancellation(source),
        _ => false,
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl WriteMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let matches_applied_total = IntCounterVec::new(
            Opts::new(
                "elo_ledger_matches_applied_total",
                "Matches whose ratings were committed",
            ),
            &["category"],
        )?;
        registry.register(Box::new(matches_applied_total.clone()))?;

        let matches_skipped_total = IntCounter::new(
            "elo_ledger_matches_skipped_total",
            "Matches not eligible for rating",
        )?;
        registry.register(Box::new(matches_skipped_total.clone()))?;

        let conflicts_total = IntCounter::new(
            "elo_ledger_conflicts_total",
            "Rating commits rejected by a concurrent write",
        )?;
        registry.register(Box::new(conflicts_total.clone()))?;

        let apply_duration = Histogram::with_opts(
            HistogramOpts::new(
                "elo_ledger_apply_duration_seconds",
                "Time to apply one match outcome",
            )
            .buckets(vec![0.0001, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]),
        )?;
        registry.register(Box::new(apply_duration.clone()))?;

        Ok(Self {
            matches_applied_total,
            matches_skipped_total,
            conflicts_total,
            apply_duration,
        })
    }
}

impl RecalculationMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let recalculations_total = IntCounterVec::new(
            Opts::new(
                "elo_ledger_recalculations_total",
                "Recalculation runs by result",
            ),
            &["result"],
        )?;
        registry.register(Box::new(recalculations_total.clone()))?;

        let matches_replayed_total = IntCounter::new(
            "elo_ledger_matches_replayed_total",
            "Matches re-applied by recalculation",
        )?;
        registry.register(Box::new(matches_replayed_total.clone()))?;

        let recalculation_duration = Histogram::with_opts(
            HistogramOpts::new(
                "elo_ledger_recalculation_duration_seconds",
                "Recalculation wall time",
            )
            .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 5.0, 30.0, 120.0]),
        )?;
        registry.register(Box::new(recalculation_duration.clone()))?;

        Ok(Self {
            recalculations_total,
            matches_replayed_total,
            recalculation_duration,
        })
    }
}

impl Default for LedgerMetrics {
    fn default() -> Self {
        Self::new().expect("Failed to create default ledger metrics")
    }
}
