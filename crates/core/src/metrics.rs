//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Quality checks (cheap manifest checks, authoritative verifies)
//! - Transfers and assemblies
//! - Item outcomes and retries

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Quality check metrics
// =============================================================================

/// Cheap manifest checks total by result.
pub static CHEAP_CHECKS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("rita_cheap_checks_total", "Total cheap manifest checks"),
        &["result"], // "pass", "reject", "inconclusive", "fetch_failed"
    )
    .unwrap()
});

/// Authoritative artifact verifies total by result.
pub static VERIFIES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "rita_verifies_total",
            "Total authoritative artifact verifications",
        ),
        &["result"], // "pass", "reject"
    )
    .unwrap()
});

// =============================================================================
// Transfer metrics
// =============================================================================

/// Transfers total by result.
pub static TRANSFERS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("rita_transfers_total", "Total segment transfers"),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

/// Transfer duration in seconds.
pub static TRANSFER_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("rita_transfer_duration_seconds", "Duration of transfers").buckets(
            vec![10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0],
        ),
        &["result"],
    )
    .unwrap()
});

// =============================================================================
// Assembly metrics
// =============================================================================

/// Assemblies total by result.
pub static ASSEMBLIES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("rita_assemblies_total", "Total container assemblies"),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

/// Assembly duration in seconds.
pub static ASSEMBLY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("rita_assembly_duration_seconds", "Duration of assemblies")
            .buckets(vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
        &["result"],
    )
    .unwrap()
});

// =============================================================================
// Item outcome metrics
// =============================================================================

/// Items completed (reached Done state).
pub static ITEMS_COMPLETED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "rita_items_completed_total",
        "Total items completed successfully",
    )
    .unwrap()
});

/// Items abandoned total.
pub static ITEMS_ABANDONED: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("rita_items_abandoned_total", "Total items abandoned").unwrap());

/// Retry attempts total (one per candidate exclusion).
pub static RETRY_ATTEMPTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "rita_retry_attempts_total",
        "Total per-item retry attempts after a failed candidate",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(CHEAP_CHECKS.clone()),
        Box::new(VERIFIES_TOTAL.clone()),
        Box::new(TRANSFERS_TOTAL.clone()),
        Box::new(TRANSFER_DURATION.clone()),
        Box::new(ASSEMBLIES_TOTAL.clone()),
        Box::new(ASSEMBLY_DURATION.clone()),
        Box::new(ITEMS_COMPLETED.clone()),
        Box::new(ITEMS_ABANDONED.clone()),
        Box::new(RETRY_ATTEMPTS.clone()),
    ]
}
