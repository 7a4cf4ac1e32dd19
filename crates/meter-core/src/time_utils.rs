use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone as _, Utc};
use chrono_tz::Tz;
use tracing::warn;

use crate::error::{MeterError, Result};
use crate::models::PeriodUnit;

// ── System timezone detection ─────────────────────────────────────────────────

/// Detect the IANA timezone name of the running system.
///
/// Falls back to `"UTC"` if detection fails.
pub fn get_system_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}

/// Resolve the `"auto"` sentinel to the system timezone; other names pass
/// through unchanged.
pub fn resolve_timezone_name(name: &str) -> String {
    if name.eq_ignore_ascii_case("auto") {
        get_system_timezone()
    } else {
        name.to_string()
    }
}

// ── TimezoneHandler ───────────────────────────────────────────────────────────

/// Timezone-aware timestamp parsing and conversion.
///
/// Timestamps without an offset (as typed by a person reading their meter)
/// are interpreted in the handler's default zone.
#[derive(Debug, Clone, Copy)]
pub struct TimezoneHandler {
    default_tz: Tz,
}

impl TimezoneHandler {
    /// Create a handler with the given IANA timezone name as the default.
    ///
    /// If `tz_name` is not a recognised IANA timezone, falls back to UTC
    /// and logs a warning.
    pub fn new(tz_name: &str) -> Self {
        let tz = tz_name.parse::<Tz>().unwrap_or_else(|_| {
            warn!(
                "TimezoneHandler: unrecognised timezone \"{}\", falling back to UTC",
                tz_name
            );
            Tz::UTC
        });
        Self { default_tz: tz }
    }

    /// Parse an RFC 3339 or naive ISO 8601 timestamp into UTC.
    ///
    /// Accepted naive forms: `YYYY-MM-DD[T| ]HH:MM[:SS[.f]]` and a bare
    /// `YYYY-MM-DD` (midnight). On a DST fold the earlier instant wins; a
    /// local time that falls into a DST gap is rejected.
    pub fn parse_timestamp(&self, s: &str) -> Result<DateTime<Utc>> {
        let s = s.trim();
        if s.is_empty() {
            return Err(MeterError::TimestampParse(s.to_string()));
        }

        let normalised = if let Some(stripped) = s.strip_suffix('Z') {
            format!("{}+00:00", stripped)
        } else {
            s.to_string()
        };
        if let Ok(dt) = DateTime::parse_from_rfc3339(&normalised) {
            return Ok(dt.with_timezone(&Utc));
        }

        const FMTS: &[&str] = &[
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%dT%H:%M",
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%d %H:%M",
        ];
        let naive = FMTS
            .iter()
            .find_map(|fmt| chrono::NaiveDateTime::parse_from_str(s, fmt).ok())
            .or_else(|| {
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })
            .ok_or_else(|| MeterError::TimestampParse(s.to_string()))?;

        self.default_tz
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| {
                MeterError::TimestampParse(format!("{} (does not exist in {})", s, self.default_tz))
            })
    }

    /// Expose the configured default timezone.
    pub fn default_tz(&self) -> Tz {
        self.default_tz
    }
}

// ── Calendar periods ──────────────────────────────────────────────────────────

/// First day of the `unit` period containing `date`.
///
/// Weeks start on Monday.
pub fn period_start(date: NaiveDate, unit: PeriodUnit) -> NaiveDate {
    match unit {
        PeriodUnit::Day => date,
        PeriodUnit::Week => {
            date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
        }
        PeriodUnit::Month => date.with_day(1).unwrap_or(date),
        PeriodUnit::Year => date.with_ordinal(1).unwrap_or(date),
    }
}

// ── Formatting ────────────────────────────────────────────────────────────────

/// Compact `YYYYMMDD_HHMMSS` token (UTC) used to name stored meter photos.
pub fn image_token(dt: &DateTime<Utc>) -> String {
    dt.format("%Y%m%d_%H%M%S").to_string()
}

/// Render `dt` in `tz` as `"2024-01-15 10:00:00 CET"`.
pub fn format_display_timestamp(dt: &DateTime<Utc>, tz: Tz) -> String {
    dt.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S %Z").to_string()
}

// ── Tests ──────────────────────────────────────────────────────────────────────
