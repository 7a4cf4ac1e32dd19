//! Usage analysis pipeline.
//!
//! Derives intervals from the raw readings, buckets them by calendar period
//! and returns a [`UsageReport`] ready for display or JSON output.

use chrono::Utc;
use chrono_tz::Tz;
use meter_core::models::{PeriodBucket, PeriodUnit, Reading, UsageInterval};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::aggregator::{PeriodAggregator, UsageTotals};
use crate::deriver::{Derivation, UsageDeriver};

// ── Public types ──────────────────────────────────────────────────────────────

/// Metadata produced alongside a usage breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    /// RFC 3339 timestamp when this report was generated.
    pub generated_at: String,
    /// Number of readings fed into the pipeline.
    pub readings_processed: usize,
    /// Number of intervals derived from them.
    pub intervals_derived: usize,
    /// Number of period buckets produced.
    pub buckets_created: usize,
}

/// Usage per calendar period, with the intervals it was built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageBreakdown {
    pub unit: PeriodUnit,
    /// IANA name of the timezone periods were cut in.
    pub timezone: String,
    /// Chronological intervals, one per consecutive reading pair.
    pub intervals: Vec<UsageInterval>,
    /// Non-empty periods, ascending.
    pub buckets: Vec<PeriodBucket>,
    pub totals: UsageTotals,
    /// How many intervals have a negative delta.
    pub negative_intervals: usize,
    pub metadata: AnalysisMetadata,
}

/// The complete output of [`analyze_usage`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UsageReport {
    /// Fewer than two readings; there is no interval to report.
    InsufficientData { readings: usize },
    Ready(UsageBreakdown),
}

impl UsageReport {
    pub fn breakdown(&self) -> Option<&UsageBreakdown> {
        match self {
            UsageReport::Ready(breakdown) => Some(breakdown),
            UsageReport::InsufficientData { .. } => None,
        }
    }
}

// ── Public function ───────────────────────────────────────────────────────────

/// Run the usage pipeline over `readings` (any order).
///
/// 1. Sort and difference the readings via [`UsageDeriver`].
/// 2. Bucket the intervals by `unit` in `tz` via [`PeriodAggregator`].
/// 3. Total the buckets and return a [`UsageReport`].
pub fn analyze_usage(readings: &[Reading], unit: PeriodUnit, tz: Tz) -> UsageReport {
    // ── Step 1: Derive ────────────────────────────────────────────────────────
    let intervals = match UsageDeriver::derive(readings) {
        Derivation::Intervals(intervals) => intervals,
        Derivation::InsufficientData { readings } => {
            return UsageReport::InsufficientData { readings };
        }
    };

    // ── Step 2: Aggregate ─────────────────────────────────────────────────────
    let buckets = PeriodAggregator::aggregate(&intervals, unit, tz);
    let totals = PeriodAggregator::calculate_totals(&buckets);
    let negative_intervals = intervals.iter().filter(|i| i.is_negative()).count();

    // ── Step 3: Build result ──────────────────────────────────────────────────
    let metadata = AnalysisMetadata {
        generated_at: Utc::now().to_rfc3339(),
        readings_processed: readings.len(),
        intervals_derived: intervals.len(),
        buckets_created: buckets.len(),
    };

    info!(
        "{} usage: {} readings, {} periods, total {:.3} kWh",
        unit.title(),
        readings.len(),
        buckets.len(),
        totals.total_usage
    );

    UsageReport::Ready(UsageBreakdown {
        unit,
        timezone: tz.name().to_string(),
        intervals,
        buckets,
        totals,
        negative_intervals,
        metadata,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
