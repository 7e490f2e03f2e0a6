//! Metrics for the rating ledger
//!
//! Prometheus counters and histograms; exporting the registry is left to the
//! embedding service.

pub mod collector;

pub use collector::{LedgerMetrics, MetricsTimer, RecalculationMetrics, WriteMetrics};
