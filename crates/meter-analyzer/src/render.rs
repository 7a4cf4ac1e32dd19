//! Plain-text rendering of records and reports.

use chrono_tz::Tz;
use meter_core::formatting::{format_kwh, format_number, Align, TextTable};
use meter_core::models::Reading;
use meter_core::time_utils::format_display_timestamp;
use meter_data::analysis::UsageBreakdown;
use meter_data::estimator::ApplianceSummary;

pub const NOT_ENOUGH_DATA: &str = "Not enough data to analyze. Add more readings.";
pub const NO_APPLIANCES: &str = "No appliances added yet.";
pub const NO_READINGS: &str = "No readings recorded yet.";

// ── Readings ──────────────────────────────────────────────────────────────────

pub fn readings_table(readings: &[Reading], tz: Tz) -> String {
    let mut table = TextTable::new([
        ("Timestamp", Align::Left),
        ("Reading (kWh)", Align::Right),
        ("Image", Align::Left),
    ]);
    for r in readings {
        table.push_row(vec![
            format_display_timestamp(&r.timestamp, tz),
            format_number(r.reading, 2),
            r.image_path.clone().unwrap_or_default(),
        ]);
    }
    table.render()
}

// ── Appliances ────────────────────────────────────────────────────────────────

pub fn appliance_table(summary: &ApplianceSummary) -> String {
    let mut table = TextTable::new([
        ("Appliance", Align::Left),
        ("Power (kW)", Align::Right),
        ("Hours/day", Align::Right),
        ("Daily (kWh)", Align::Right),
    ]);
    for e in &summary.estimates {
        table.push_row(vec![
            e.appliance.name.clone(),
            format_number(e.appliance.power_kw, 3),
            format_number(e.appliance.hours_per_day, 2),
            format_number(e.daily_kwh, 2),
        ]);
    }
    format!(
        "{}\n\nEstimated Daily Usage: {}",
        table.render(),
        format_kwh(summary.total_daily_kwh)
    )
}

// ── Usage ─────────────────────────────────────────────────────────────────────

pub fn usage_table(breakdown: &UsageBreakdown) -> String {
    let mut table = TextTable::new([
        ("Period", Align::Left),
        ("Usage (kWh)", Align::Right),
        ("Intervals", Align::Right),
    ]);
    for bucket in &breakdown.buckets {
        table.push_row(vec![
            bucket.label.to_string(),
            format_number(bucket.total_usage, 2),
            bucket.intervals.to_string(),
        ]);
    }
    table.set_footer(vec![
        "Total".to_string(),
        format_number(breakdown.totals.total_usage, 2),
        breakdown.totals.intervals.to_string(),
    ]);

    let mut out = format!(
        "{} usage ({})\n\n{}",
        breakdown.unit.title(),
        breakdown.timezone,
        table.render()
    );
    if breakdown.negative_intervals > 0 {
        out.push_str(&format!(
            "\n\nNote: {} interval(s) show negative usage; check for a meter reset or a mistyped reading.",
            breakdown.negative_intervals
        ));
    }
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────
