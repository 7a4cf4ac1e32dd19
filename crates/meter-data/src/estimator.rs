//! Appliance-based daily consumption estimate.

use meter_core::models::{Appliance, ApplianceEstimate};
use serde::{Deserialize, Serialize};

/// Per-appliance estimates plus their sum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplianceSummary {
    /// One entry per appliance, in insertion order.
    pub estimates: Vec<ApplianceEstimate>,
    pub total_daily_kwh: f64,
}

/// Outcome of [`ApplianceEstimator::estimate`].
///
/// An empty appliance list is reported as [`ApplianceReport::NoAppliances`]
/// so callers can tell "nothing recorded" apart from a genuine 0 kWh total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ApplianceReport {
    NoAppliances,
    Ready(ApplianceSummary),
}

impl ApplianceReport {
    pub fn summary(&self) -> Option<&ApplianceSummary> {
        match self {
            ApplianceReport::Ready(summary) => Some(summary),
            ApplianceReport::NoAppliances => None,
        }
    }
}

pub struct ApplianceEstimator;

impl ApplianceEstimator {
    /// `daily_kwh = power_kw × hours_per_day` for every appliance, unrounded.
    pub fn estimate(appliances: &[Appliance]) -> ApplianceReport {
        if appliances.is_empty() {
            return ApplianceReport::NoAppliances;
        }

        let estimates: Vec<ApplianceEstimate> = appliances
            .iter()
            .map(|a| ApplianceEstimate {
                appliance: a.clone(),
                daily_kwh: a.daily_kwh(),
            })
            .collect();
        let total_daily_kwh = estimates.iter().map(|e| e.daily_kwh).sum();

        ApplianceReport::Ready(ApplianceSummary {
            estimates,
            total_daily_kwh,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
