mod bootstrap;
mod render;

use std::io::Write;

use anyhow::{Context, Result};
use chrono::Utc;
use meter_core::formatting::format_kwh;
use meter_core::settings::{Command, Settings};
use meter_core::time_utils::{format_display_timestamp, TimezoneHandler};
use meter_data::analysis::UsageReport;
use meter_data::estimator::ApplianceReport;
use meter_data::images::ImageUpload;
use meter_runtime::data_manager::DataManager;

fn main() -> Result<()> {
    let settings = Settings::load_with_last_used();
    let data_dir = settings.resolved_data_dir();

    bootstrap::ensure_directories(&data_dir)?;
    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    tracing::info!("Meter Analyzer v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Data dir: {}, Timezone: {}",
        data_dir.display(),
        settings.timezone
    );

    let tz = TimezoneHandler::new(&settings.timezone);
    let manager = DataManager::open(&data_dir, tz.default_tz())
        .with_context(|| format!("could not open data directory {}", data_dir.display()))?;

    let stdout = std::io::stdout();
    run(&settings, &manager, &tz, &mut stdout.lock())
}

/// Execute the parsed command against `manager`, writing results to `out`.
fn run(
    settings: &Settings,
    manager: &DataManager,
    tz: &TimezoneHandler,
    out: &mut impl Write,
) -> Result<()> {
    match &settings.command {
        Command::RecordReading { reading, at, image } => {
            let timestamp = match at {
                Some(raw) => tz.parse_timestamp(raw)?,
                None => Utc::now(),
            };
            let upload = image
                .as_deref()
                .map(ImageUpload::from_file)
                .transpose()?;

            let record = manager.record_reading(timestamp, *reading, upload)?;
            if settings.json {
                writeln!(out, "{}", serde_json::to_string_pretty(&record)?)?;
            } else {
                writeln!(
                    out,
                    "Recorded {} at {}",
                    format_kwh(record.reading),
                    format_display_timestamp(&record.timestamp, tz.default_tz())
                )?;
                if let Some(path) = &record.image_path {
                    writeln!(out, "Image saved to {}", path)?;
                }
            }
        }

        Command::RecordAppliance {
            name,
            power_kw,
            hours,
        } => {
            let appliance = manager.record_appliance(name, *power_kw, *hours)?;
            if settings.json {
                writeln!(out, "{}", serde_json::to_string_pretty(&appliance)?)?;
            } else {
                writeln!(
                    out,
                    "Added {}: {} kW for {} h/day ({})",
                    appliance.name,
                    appliance.power_kw,
                    appliance.hours_per_day,
                    format_kwh(appliance.daily_kwh())
                )?;
            }
        }

        Command::Readings { insertion_order } => {
            let readings = if *insertion_order {
                manager.get_all_readings()?
            } else {
                manager.get_readings_chronological()?
            };
            if settings.json {
                writeln!(out, "{}", serde_json::to_string_pretty(&readings)?)?;
            } else if readings.is_empty() {
                writeln!(out, "{}", render::NO_READINGS)?;
            } else {
                writeln!(out, "{}", render::readings_table(&readings, tz.default_tz()))?;
            }
        }

        Command::Appliances => {
            let report = manager.get_appliance_report()?;
            if settings.json {
                writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
            } else {
                match &report {
                    ApplianceReport::NoAppliances => writeln!(out, "{}", render::NO_APPLIANCES)?,
                    ApplianceReport::Ready(summary) => {
                        writeln!(out, "{}", render::appliance_table(summary))?
                    }
                }
            }
        }

        Command::Usage { by } => {
            let report = manager.get_usage_report(*by)?;
            if settings.json {
                writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
            } else {
                match &report {
                    UsageReport::InsufficientData { readings } => {
                        tracing::info!("{} reading(s) stored; need at least 2", readings);
                        writeln!(out, "{}", render::NOT_ENOUGH_DATA)?
                    }
                    UsageReport::Ready(breakdown) => {
                        writeln!(out, "{}", render::usage_table(breakdown))?
                    }
                }
            }
        }
    }

    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    /// Parse `args` (without the program name) into settings pointing at `dir`.
    fn settings(dir: &TempDir, args: &[&str]) -> Settings {
        let mut argv = vec![
            "meter-analyzer".to_string(),
            "--data-dir".to_string(),
            dir.path().display().to_string(),
            "--timezone".to_string(),
            "UTC".to_string(),
        ];
        argv.extend(args.iter().map(|s| s.to_string()));
        Settings::try_parse_from(argv).expect("valid args")
    }

    /// Run a command and return everything it printed.
    fn exec(dir: &TempDir, args: &[&str]) -> Result<String> {
        let settings = settings(dir, args);
        let tz = TimezoneHandler::new(&settings.timezone);
        let manager = DataManager::open(dir.path(), tz.default_tz())?;
        let mut out = Vec::new();
        run(&settings, &manager, &tz, &mut out)?;
        Ok(String::from_utf8(out).expect("utf-8 output"))
    }

    #[test]
    fn test_usage_soft_state_message() {
        let dir = TempDir::new().expect("tempdir");
        let out = exec(&dir, &["usage", "--by", "week"]).unwrap();
        assert_eq!(out.trim(), render::NOT_ENOUGH_DATA);

        exec(&dir, &["record-reading", "--reading", "100", "--at", "2024-01-01 12:00"]).unwrap();
        let out = exec(&dir, &["usage"]).unwrap();
        assert_eq!(out.trim(), render::NOT_ENOUGH_DATA);
    }

    #[test]
    fn test_appliances_soft_state_message() {
        let dir = TempDir::new().expect("tempdir");
        let out = exec(&dir, &["appliances"]).unwrap();
        assert_eq!(out.trim(), render::NO_APPLIANCES);
    }

    #[test]
    fn test_record_then_daily_usage() {
        let dir = TempDir::new().expect("tempdir");
        for (at, value) in [
            ("2024-01-01T12:00:00Z", "100"),
            ("2024-01-02T12:00:00Z", "110"),
            ("2024-01-03T12:00:00Z", "125"),
        ] {
            exec(&dir, &["record-reading", "--reading", value, "--at", at]).unwrap();
        }

        let out = exec(&dir, &["usage", "--by", "daily"]).unwrap();
        assert!(out.contains("2024-01-02"));
        assert!(out.contains("2024-01-03"));
        assert!(!out.contains("2024-01-01  "));
        assert!(out.contains("25.00"));
    }

    #[test]
    fn test_usage_json_output() {
        let dir = TempDir::new().expect("tempdir");
        exec(&dir, &["record-reading", "--reading", "100", "--at", "2024-01-01T12:00:00Z"]).unwrap();
        exec(&dir, &["record-reading", "--reading", "90", "--at", "2024-01-02T12:00:00Z"]).unwrap();

        let out = exec(&dir, &["--json", "usage", "--by", "month"]).unwrap();
        let json: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(json["status"], "ready");
        assert_eq!(json["buckets"][0]["total_usage"], -10.0);
        assert_eq!(json["negative_intervals"], 1);
    }

    #[test]
    fn test_record_reading_with_image_file() {
        let dir = TempDir::new().expect("tempdir");
        let photo = dir.path().join("meter.jpg");
        std::fs::write(&photo, b"jpeg bytes").unwrap();

        let out = exec(
            &dir,
            &[
                "record-reading",
                "--reading",
                "1520.4",
                "--at",
                "2024-01-15T10:30:05Z",
                "--image",
                photo.to_str().unwrap(),
            ],
        )
        .unwrap();

        assert!(out.contains("Recorded 1,520.40 kWh at 2024-01-15 10:30:05 UTC"));
        assert!(out.contains("20240115_103005.jpg"));
    }

    #[test]
    fn test_readings_order() {
        let dir = TempDir::new().expect("tempdir");
        exec(&dir, &["record-reading", "--reading", "125", "--at", "2024-01-03"]).unwrap();
        exec(&dir, &["record-reading", "--reading", "100", "--at", "2024-01-01"]).unwrap();

        let sorted = exec(&dir, &["readings"]).unwrap();
        assert!(sorted.find("2024-01-01").unwrap() < sorted.find("2024-01-03").unwrap());

        let inserted = exec(&dir, &["readings", "--insertion-order"]).unwrap();
        assert!(inserted.find("2024-01-03").unwrap() < inserted.find("2024-01-01").unwrap());
    }

    #[test]
    fn test_record_appliance_and_estimate() {
        let dir = TempDir::new().expect("tempdir");
        exec(&dir, &["record-appliance", "--name", "Fridge", "--power-kw", "0.15", "--hours", "24"])
            .unwrap();
        exec(&dir, &["record-appliance", "--name", "Lamp", "--power-kw", "0.06", "--hours", "5"])
            .unwrap();

        let out = exec(&dir, &["appliances"]).unwrap();
        assert!(out.contains("Estimated Daily Usage: 3.90 kWh"));
    }

    #[test]
    fn test_bad_timestamp_is_hard_error() {
        let dir = TempDir::new().expect("tempdir");
        let err = exec(&dir, &["record-reading", "--reading", "5", "--at", "yesterday"]).unwrap_err();
        assert!(err.to_string().contains("yesterday"));
        let listed = exec(&dir, &["readings"]).unwrap();
        assert_eq!(listed.trim(), render::NO_READINGS);
    }
}
