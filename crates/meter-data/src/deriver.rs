//! Turns cumulative meter readings into per-interval consumption.

use meter_core::models::{Reading, UsageInterval};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Outcome of [`UsageDeriver::derive`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Derivation {
    /// Fewer than [`UsageDeriver::MIN_READINGS`] readings were supplied.
    InsufficientData { readings: usize },
    /// One interval per consecutive pair of readings.
    Intervals(Vec<UsageInterval>),
}

/// Stateless helper that differences consecutive readings.
pub struct UsageDeriver;

impl UsageDeriver {
    /// A usage interval needs a baseline reading and one after it.
    pub const MIN_READINGS: usize = 2;

    /// Copy of `readings` ordered by timestamp. The sort is stable, so
    /// readings sharing a timestamp keep their insertion order.
    pub fn sort_chronologically(readings: &[Reading]) -> Vec<Reading> {
        let mut sorted = readings.to_vec();
        sorted.sort_by_key(|r| r.timestamp);
        sorted
    }

    /// Derive usage intervals from `readings` (any order).
    ///
    /// After sorting, interval `i` covers readings `i-1` and `i` with
    /// `delta = reading[i] - reading[i-1]`. Negative deltas (meter reset,
    /// typo) are kept as they are and logged.
    pub fn derive(readings: &[Reading]) -> Derivation {
        if readings.len() < Self::MIN_READINGS {
            debug!("Only {} reading(s); nothing to derive", readings.len());
            return Derivation::InsufficientData {
                readings: readings.len(),
            };
        }

        let sorted = Self::sort_chronologically(readings);
        let intervals: Vec<UsageInterval> = sorted
            .windows(2)
            .map(|pair| {
                let (prev, curr) = (&pair[0], &pair[1]);
                let interval = UsageInterval {
                    period_start: prev.timestamp,
                    period_end: curr.timestamp,
                    delta: curr.reading - prev.reading,
                };
                if interval.is_negative() {
                    warn!(
                        "Reading at {} ({}) is lower than the one before ({}); usage {} kept as-is",
                        curr.timestamp, curr.reading, prev.reading, interval.delta
                    );
                }
                interval
            })
            .collect();

        debug!(
            "Derived {} intervals from {} readings",
            intervals.len(),
            readings.len()
        );
        Derivation::Intervals(intervals)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
