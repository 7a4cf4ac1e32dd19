use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, SubsecRound, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MeterError, Result};
use crate::time_utils::period_start;

// ── Validation ────────────────────────────────────────────────────────────────

/// Check that `value` is a finite, non-negative number.
///
/// `field` names the offending input in the resulting
/// [`MeterError::Validation`].
pub fn validate_amount(field: &'static str, value: f64) -> Result<f64> {
    if !value.is_finite() {
        return Err(MeterError::validation(field, "must be a finite number"));
    }
    if value < 0.0 {
        return Err(MeterError::validation(
            field,
            format!("must not be negative (got {})", value),
        ));
    }
    Ok(value)
}

/// Parse a decimal string and validate it with [`validate_amount`].
///
/// Non-numeric input is a validation failure, not a parse error, so that
/// every rejected field surfaces the same way to the caller.
pub fn parse_amount(field: &'static str, raw: &str) -> Result<f64> {
    let value: f64 = raw.trim().parse().map_err(|_| {
        MeterError::validation(field, format!("not a number: \"{}\"", raw.trim()))
    })?;
    validate_amount(field, value)
}

// ── Reading ───────────────────────────────────────────────────────────────────

/// A single cumulative meter reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// When the meter was read, at second precision.
    pub timestamp: DateTime<Utc>,
    /// Cumulative meter value in kWh.
    pub reading: f64,
    /// Path of the stored meter photo, if one was supplied.
    #[serde(default)]
    pub image_path: Option<String>,
}

impl Reading {
    /// Build a validated reading. Sub-second precision is dropped.
    pub fn new(timestamp: DateTime<Utc>, reading: f64, image_path: Option<String>) -> Result<Self> {
        let reading = Self {
            timestamp: timestamp.trunc_subsecs(0),
            reading,
            image_path,
        };
        reading.validate()?;
        Ok(reading)
    }

    /// Re-check the invariants of a record, e.g. one loaded from disk.
    pub fn validate(&self) -> Result<()> {
        if self.timestamp.nanosecond() != 0 {
            return Err(MeterError::validation(
                "timestamp",
                "must be a whole second (sub-second precision is not stored)",
            ));
        }
        validate_amount("reading", self.reading)?;
        Ok(())
    }
}

// ── Appliance ─────────────────────────────────────────────────────────────────

/// A household appliance's power profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appliance {
    /// Free-form display name; not required to be unique.
    pub name: String,
    /// Rated power draw in kW.
    pub power_kw: f64,
    /// Typical hours of use per day. Values above 24 are accepted.
    pub hours_per_day: f64,
}

impl Appliance {
    /// Build a validated appliance profile.
    pub fn new(name: impl Into<String>, power_kw: f64, hours_per_day: f64) -> Result<Self> {
        let appliance = Self {
            name: name.into(),
            power_kw,
            hours_per_day,
        };
        appliance.validate()?;
        Ok(appliance)
    }

    /// Re-check the invariants of a record, e.g. one loaded from disk.
    pub fn validate(&self) -> Result<()> {
        validate_amount("power_kw", self.power_kw)?;
        validate_amount("hours_per_day", self.hours_per_day)?;
        Ok(())
    }

    /// Idealised daily energy use: `power_kw × hours_per_day`.
    pub fn daily_kwh(&self) -> f64 {
        self.power_kw * self.hours_per_day
    }
}

// ── Derived values ────────────────────────────────────────────────────────────

/// Consumption between two consecutive readings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageInterval {
    /// Timestamp of the earlier reading.
    pub period_start: DateTime<Utc>,
    /// Timestamp of the later reading; decides the bucket.
    pub period_end: DateTime<Utc>,
    /// `later.reading - earlier.reading`; negative after a meter reset.
    pub delta: f64,
}

impl UsageInterval {
    pub fn is_negative(&self) -> bool {
        self.delta < 0.0
    }
}

/// Calendar unit used to bucket usage intervals.
///
/// Parsed case-insensitively from `day|daily|d`, `week|weekly|w`,
/// `month|monthly|m` and `year|yearly|y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodUnit {
    Day,
    /// ISO weeks, Monday through Sunday.
    Week,
    Month,
    Year,
}

impl PeriodUnit {
    /// Adjective used in report titles, e.g. `"Daily"`.
    pub fn title(&self) -> &'static str {
        match self {
            PeriodUnit::Day => "Daily",
            PeriodUnit::Week => "Weekly",
            PeriodUnit::Month => "Monthly",
            PeriodUnit::Year => "Yearly",
        }
    }
}

impl fmt::Display for PeriodUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PeriodUnit::Day => "day",
            PeriodUnit::Week => "week",
            PeriodUnit::Month => "month",
            PeriodUnit::Year => "year",
        };
        f.write_str(s)
    }
}

impl FromStr for PeriodUnit {
    type Err = MeterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "day" | "daily" | "d" => Ok(PeriodUnit::Day),
            "week" | "weekly" | "w" => Ok(PeriodUnit::Week),
            "month" | "monthly" | "m" => Ok(PeriodUnit::Month),
            "year" | "yearly" | "y" => Ok(PeriodUnit::Year),
            _ => Err(MeterError::UnknownPeriod(s.to_string())),
        }
    }
}

/// One specific calendar period, identified by its first day.
///
/// Ordering follows `start`, so labels of one unit sort chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeriodLabel {
    pub start: NaiveDate,
    pub unit: PeriodUnit,
}

impl PeriodLabel {
    /// The period of kind `unit` that contains `date`.
    pub fn containing(date: NaiveDate, unit: PeriodUnit) -> Self {
        Self {
            start: period_start(date, unit),
            unit,
        }
    }
}

impl fmt::Display for PeriodLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.unit {
            PeriodUnit::Day => write!(f, "{}", self.start.format("%Y-%m-%d")),
            PeriodUnit::Week => {
                let iso = self.start.iso_week();
                write!(f, "{}-W{:02}", iso.year(), iso.week())
            }
            PeriodUnit::Month => write!(f, "{}", self.start.format("%Y-%m")),
            PeriodUnit::Year => write!(f, "{}", self.start.year()),
        }
    }
}

/// Summed usage for one calendar period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodBucket {
    pub label: PeriodLabel,
    /// Sum of the deltas whose interval ends inside this period.
    pub total_usage: f64,
    /// Number of intervals that contributed.
    pub intervals: usize,
}

/// Daily energy estimate for one appliance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplianceEstimate {
    #[serde(flatten)]
    pub appliance: Appliance,
    pub daily_kwh: f64,
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_validate_amount_accepts_zero_and_positive() {
        assert_eq!(validate_amount("reading", 0.0).unwrap(), 0.0);
        assert_eq!(validate_amount("reading", 1234.5).unwrap(), 1234.5);
    }

    #[test]
    fn test_validate_amount_rejects_negative() {
        let err = validate_amount("power_kw", -0.5).unwrap_err();
        assert!(matches!(
            err,
            MeterError::Validation {
                field: "power_kw",
                ..
            }
        ));
    }

    #[test]
    fn test_validate_amount_rejects_non_finite() {
        assert!(validate_amount("reading", f64::NAN).is_err());
        assert!(validate_amount("reading", f64::INFINITY).is_err());
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("hours_per_day", " 4.5 ").unwrap(), 4.5);
        let err = parse_amount("hours_per_day", "four").unwrap_err();
        assert!(err.to_string().contains("not a number"));
        assert!(parse_amount("hours_per_day", "-1").is_err());
    }

    #[test]
    fn test_reading_new_truncates_subseconds() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap()
            + chrono::Duration::milliseconds(750);
        let reading = Reading::new(ts, 100.0, None).unwrap();
        assert_eq!(
            reading.timestamp,
            Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_reading_validate_rejects_subseconds() {
        let reading = Reading {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap()
                + chrono::Duration::milliseconds(250),
            reading: 10.0,
            image_path: None,
        };
        let err = reading.validate().unwrap_err();
        assert!(matches!(
            err,
            MeterError::Validation {
                field: "timestamp",
                ..
            }
        ));
    }

    #[test]
    fn test_reading_new_rejects_negative() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        assert!(Reading::new(ts, -3.0, None).is_err());
    }

    #[test]
    fn test_appliance_daily_kwh_exact() {
        let appliance = Appliance::new("Heater", 1.5, 4.0).unwrap();
        assert_eq!(appliance.daily_kwh(), 6.0);
    }

    #[test]
    fn test_appliance_accepts_more_than_24_hours() {
        assert!(Appliance::new("Odd", 0.1, 30.0).is_ok());
        assert!(Appliance::new("Bad", 0.1, -1.0).is_err());
    }

    #[test]
    fn test_period_unit_from_str_aliases() {
        assert_eq!("Daily".parse::<PeriodUnit>().unwrap(), PeriodUnit::Day);
        assert_eq!("w".parse::<PeriodUnit>().unwrap(), PeriodUnit::Week);
        assert_eq!("month".parse::<PeriodUnit>().unwrap(), PeriodUnit::Month);
        assert_eq!("YEARLY".parse::<PeriodUnit>().unwrap(), PeriodUnit::Year);
        assert!("hourly".parse::<PeriodUnit>().is_err());
    }

    #[test]
    fn test_period_label_display() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 17).unwrap();
        assert_eq!(
            PeriodLabel::containing(date, PeriodUnit::Day).to_string(),
            "2024-01-17"
        );
        assert_eq!(
            PeriodLabel::containing(date, PeriodUnit::Week).to_string(),
            "2024-W03"
        );
        assert_eq!(
            PeriodLabel::containing(date, PeriodUnit::Month).to_string(),
            "2024-01"
        );
        assert_eq!(
            PeriodLabel::containing(date, PeriodUnit::Year).to_string(),
            "2024"
        );
    }

    #[test]
    fn test_period_label_week_across_year_boundary() {
        // 2024-12-31 is a Tuesday in ISO week 1 of 2025.
        let date = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        let label = PeriodLabel::containing(date, PeriodUnit::Week);
        assert_eq!(label.start, NaiveDate::from_ymd_opt(2024, 12, 30).unwrap());
        assert_eq!(label.to_string(), "2025-W01");
    }

    #[test]
    fn test_period_label_ordering() {
        let a = PeriodLabel::containing(NaiveDate::from_ymd_opt(2023, 12, 1).unwrap(), PeriodUnit::Month);
        let b = PeriodLabel::containing(NaiveDate::from_ymd_opt(2024, 2, 9).unwrap(), PeriodUnit::Month);
        assert!(a < b);
    }

    #[test]
    fn test_appliance_estimate_serializes_flat() {
        let estimate = ApplianceEstimate {
            appliance: Appliance::new("Lamp", 0.06, 5.0).unwrap(),
            daily_kwh: 0.3,
        };
        let json = serde_json::to_value(&estimate).unwrap();
        assert_eq!(json["name"], "Lamp");
        assert_eq!(json["daily_kwh"], 0.3);
    }
}
