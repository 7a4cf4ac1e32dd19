//! Usage aggregation over calendar periods.
//!
//! Each interval is attributed to the period that contains its end
//! timestamp, as seen in the reporting timezone. Periods without any
//! interval are left out rather than reported as zero.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use meter_core::models::{PeriodBucket, PeriodLabel, PeriodUnit, UsageInterval};
use serde::{Deserialize, Serialize};

// ── UsageTotals ───────────────────────────────────────────────────────────────

/// Totals accumulated across all buckets of a report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageTotals {
    pub total_usage: f64,
    pub intervals: usize,
    pub periods: usize,
}

// ── PeriodAggregator ──────────────────────────────────────────────────────────

/// Stateless helper that groups usage intervals by calendar period.
pub struct PeriodAggregator;

impl PeriodAggregator {
    /// Aggregate `intervals` into `unit` periods of the `tz` calendar.
    ///
    /// Returns buckets sorted by period (ascending).
    pub fn aggregate(intervals: &[UsageInterval], unit: PeriodUnit, tz: Tz) -> Vec<PeriodBucket> {
        Self::aggregate_by_period(intervals, |end| {
            PeriodLabel::containing(end.with_timezone(&tz).date_naive(), unit)
        })
    }

    /// Sum up all buckets into a single [`UsageTotals`].
    pub fn calculate_totals(buckets: &[PeriodBucket]) -> UsageTotals {
        let mut totals = UsageTotals::default();
        for bucket in buckets {
            totals.total_usage += bucket.total_usage;
            totals.intervals += bucket.intervals;
            totals.periods += 1;
        }
        totals
    }

    // ── Private ───────────────────────────────────────────────────────────────

    /// Generic aggregation driver.
    ///
    /// `label_fn` maps an interval's end timestamp to its period.
    fn aggregate_by_period(
        intervals: &[UsageInterval],
        label_fn: impl Fn(DateTime<Utc>) -> PeriodLabel,
    ) -> Vec<PeriodBucket> {
        let mut map: BTreeMap<PeriodLabel, PeriodBucket> = BTreeMap::new();

        for interval in intervals {
            let label = label_fn(interval.period_end);
            let bucket = map.entry(label).or_insert_with(|| PeriodBucket {
                label,
                total_usage: 0.0,
                intervals: 0,
            });
            bucket.total_usage += interval.delta;
            bucket.intervals += 1;
        }

        map.into_values().collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
