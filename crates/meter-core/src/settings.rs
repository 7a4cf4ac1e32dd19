use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::models::{parse_amount, PeriodUnit};

/// Name of the per-user application directory under `$HOME`.
pub const APP_DIR_NAME: &str = ".meter-analyzer";

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Record electricity meter readings and analyse consumption
#[derive(Parser, Debug, Clone)]
#[command(
    name = "meter-analyzer",
    about = "Record electricity meter readings and analyse consumption",
    version
)]
pub struct Settings {
    /// Directory holding the readings and appliances logs
    #[arg(long, global = true, env = "METER_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Timezone for naive timestamps and period boundaries (auto-detected if not specified)
    #[arg(long, global = true, env = "METER_TIMEZONE", default_value = "auto")]
    pub timezone: String,

    /// Print reports as JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    /// Logging level
    #[arg(long, global = true, default_value = "WARNING", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long, global = true)]
    pub clear: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Operations exposed on the command line.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Record a cumulative meter reading
    RecordReading {
        /// Meter value in kWh
        #[arg(long, value_parser = parse_reading_arg, allow_negative_numbers = true)]
        reading: f64,
        /// Time of the reading (defaults to now)
        #[arg(long)]
        at: Option<String>,
        /// Photo of the meter to store alongside the reading
        #[arg(long)]
        image: Option<PathBuf>,
    },

    /// Add an appliance power profile
    RecordAppliance {
        /// Appliance name
        #[arg(long)]
        name: String,
        /// Power rating in kW
        #[arg(long, value_parser = parse_power_arg, allow_negative_numbers = true)]
        power_kw: f64,
        /// Usage per day in hours
        #[arg(long, value_parser = parse_hours_arg, allow_negative_numbers = true)]
        hours: f64,
    },

    /// List all recorded readings
    Readings {
        /// Keep the order in which readings were recorded
        #[arg(long)]
        insertion_order: bool,
    },

    /// Show appliances with their estimated daily usage
    Appliances,

    /// Show consumption per calendar period
    Usage {
        /// Period to group by: day, week, month or year
        #[arg(long, value_parser = parse_period_arg, default_value = "day")]
        by: PeriodUnit,
    },
}

fn parse_reading_arg(s: &str) -> crate::error::Result<f64> {
    parse_amount("reading", s)
}

fn parse_power_arg(s: &str) -> crate::error::Result<f64> {
    parse_amount("power_kw", s)
}

fn parse_hours_arg(s: &str) -> crate::error::Result<f64> {
    parse_amount("hours_per_day", s)
}

fn parse_period_arg(s: &str) -> crate::error::Result<PeriodUnit> {
    s.parse()
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted last-used parameters saved to `~/.meter-analyzer/last_used.json`.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<PeriodUnit>,
}

impl LastUsedParams {
    /// Return the default path to the persisted config file.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&home_dir())
    }

    /// Return the config path rooted at `base_dir` (used for testing).
    pub fn config_path_in(base_dir: &Path) -> PathBuf {
        base_dir.join(APP_DIR_NAME).join("last_used.json")
    }

    /// Load persisted params from an explicit path.
    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Atomically write params to an explicit path, creating parent
    /// directories if needed.
    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Delete the config file at an explicit path if it exists.
    pub fn clear_at(path: &Path) -> Result<(), std::io::Error> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments, merge with last-used params where no explicit
    /// value was provided, resolve `"auto"` values, and persist the result.
    pub fn load_with_last_used() -> Self {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Full implementation; accepts args and an explicit config path so that
    /// tests can redirect to a temporary directory.
    pub fn load_with_last_used_impl(
        args: Vec<std::ffi::OsString>,
        config_path: &Path,
    ) -> Self {
        let matches = Settings::command().get_matches_from(args);
        let mut settings =
            Settings::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

        if settings.clear {
            let _ = LastUsedParams::clear_at(config_path);
            return Self::resolve_auto_values(settings);
        }

        let last = LastUsedParams::load_from(config_path);

        if !is_arg_explicitly_set(&matches, "timezone") {
            if let Some(v) = last.timezone {
                settings.timezone = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "data_dir") && settings.data_dir.is_none() {
            settings.data_dir = last.data_dir;
        }
        if let Command::Usage { by } = &mut settings.command {
            let explicit = matches
                .subcommand_matches("usage")
                .map(|m| is_arg_explicitly_set(m, "by"))
                .unwrap_or(false);
            if !explicit {
                if let Some(period) = last.period {
                    *by = period;
                }
            }
        }

        settings = Self::resolve_auto_values(settings);

        let mut params = LastUsedParams::from(&settings);
        if params.period.is_none() {
            params.period = last.period;
        }
        let _ = params.save_to(config_path);

        settings
    }

    /// Data directory to use: the configured one, or
    /// `~/.meter-analyzer/data`.
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| home_dir().join(APP_DIR_NAME).join("data"))
    }

    /// Resolve `"auto"` sentinel values and apply the `--debug` flag.
    fn resolve_auto_values(mut settings: Settings) -> Settings {
        settings.timezone = crate::time_utils::resolve_timezone_name(&settings.timezone);

        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }

        settings
    }
}

// ── Conversion ─────────────────────────────────────────────────────────────────

impl From<&Settings> for LastUsedParams {
    fn from(s: &Settings) -> Self {
        let period = match s.command {
            Command::Usage { by } => Some(by),
            _ => None,
        };
        LastUsedParams {
            timezone: Some(s.timezone.clone()),
            data_dir: s.data_dir.clone(),
            period,
        }
    }
}

// ── Helpers ────────────────────────────────────────────────────────────────────

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Returns `true` when `name` was supplied on the command line or through
/// its environment variable, i.e. not left at its default.
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches!(
        matches.value_source(name),
        Some(clap::parser::ValueSource::CommandLine) | Some(clap::parser::ValueSource::EnvVariable)
    )
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tmp_config_path(tmp: &TempDir) -> PathBuf {
        LastUsedParams::config_path_in(tmp.path())
    }

    fn args(list: &[&str]) -> Vec<std::ffi::OsString> {
        list.iter().map(|s| s.into()).collect()
    }

    #[test]
    fn test_last_used_params_save_load() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        let params = LastUsedParams {
            timezone: Some("Europe/Berlin".to_string()),
            data_dir: Some(PathBuf::from("/srv/meter")),
            period: Some(PeriodUnit::Month),
        };

        params.save_to(&path).expect("save");
        let loaded = LastUsedParams::load_from(&path);

        assert_eq!(loaded, params);
    }

    #[test]
    fn test_last_used_params_clear() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        LastUsedParams::default().save_to(&path).expect("save");
        assert!(path.exists());

        LastUsedParams::clear_at(&path).expect("clear");
        assert!(!path.exists());
    }

    #[test]
    fn test_last_used_params_default_when_missing_or_corrupt() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        assert_eq!(LastUsedParams::load_from(&path), LastUsedParams::default());

        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(LastUsedParams::load_from(&path), LastUsedParams::default());
    }

    #[test]
    fn test_settings_default_values() {
        let settings = Settings::parse_from(["meter-analyzer", "appliances"]);

        assert!(settings.data_dir.is_none());
        assert_eq!(settings.timezone, "auto");
        assert!(!settings.json);
        assert_eq!(settings.log_level, "WARNING");
        assert!(settings.log_file.is_none());
        assert!(!settings.debug);
        assert!(!settings.clear);
        assert_eq!(settings.command, Command::Appliances);
    }

    #[test]
    fn test_settings_record_reading() {
        let settings = Settings::parse_from([
            "meter-analyzer",
            "record-reading",
            "--reading",
            "1234.5",
            "--at",
            "2024-01-15 10:00",
        ]);
        assert_eq!(
            settings.command,
            Command::RecordReading {
                reading: 1234.5,
                at: Some("2024-01-15 10:00".to_string()),
                image: None,
            }
        );
    }

    #[test]
    fn test_settings_rejects_negative_reading() {
        let result =
            Settings::try_parse_from(["meter-analyzer", "record-reading", "--reading", "-5"]);
        let err = result.unwrap_err();
        assert!(err.to_string().contains("must not be negative"));
    }

    #[test]
    fn test_settings_rejects_non_numeric_power() {
        let result = Settings::try_parse_from([
            "meter-analyzer",
            "record-appliance",
            "--name",
            "Fridge",
            "--power-kw",
            "lots",
            "--hours",
            "24",
        ]);
        assert!(result.unwrap_err().to_string().contains("not a number"));
    }

    #[test]
    fn test_settings_usage_aliases() {
        let settings = Settings::parse_from(["meter-analyzer", "usage", "--by", "monthly"]);
        assert_eq!(
            settings.command,
            Command::Usage {
                by: PeriodUnit::Month
            }
        );
    }

    #[test]
    fn test_settings_usage_period_is_case_insensitive() {
        for (raw, expected) in [
            ("Daily", PeriodUnit::Day),
            ("WEEK", PeriodUnit::Week),
            ("M", PeriodUnit::Month),
            ("Yearly", PeriodUnit::Year),
        ] {
            let settings = Settings::try_parse_from(["meter-analyzer", "usage", "--by", raw])
                .expect("period parses");
            assert_eq!(settings.command, Command::Usage { by: expected });
        }
    }

    #[test]
    fn test_settings_usage_rejects_unknown_period() {
        let result = Settings::try_parse_from(["meter-analyzer", "usage", "--by", "fortnight"]);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Unknown period unit: fortnight"));
    }

    #[test]
    fn test_settings_global_flags_after_subcommand() {
        let settings = Settings::parse_from(["meter-analyzer", "readings", "--json"]);
        assert!(settings.json);
    }

    #[test]
    fn test_load_with_last_used_merges_persisted_values() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams {
            timezone: Some("Asia/Tokyo".to_string()),
            data_dir: Some(PathBuf::from("/srv/meter")),
            period: Some(PeriodUnit::Week),
        }
        .save_to(&config_path)
        .expect("save");

        let settings =
            Settings::load_with_last_used_impl(args(&["meter-analyzer", "usage"]), &config_path);
        assert_eq!(settings.timezone, "Asia/Tokyo");
        assert_eq!(settings.data_dir, Some(PathBuf::from("/srv/meter")));
        assert_eq!(settings.command, Command::Usage { by: PeriodUnit::Week });
    }

    #[test]
    fn test_load_with_last_used_cli_overrides_persisted() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams {
            timezone: Some("Asia/Tokyo".to_string()),
            period: Some(PeriodUnit::Week),
            ..Default::default()
        }
        .save_to(&config_path)
        .expect("save");

        let settings = Settings::load_with_last_used_impl(
            args(&[
                "meter-analyzer",
                "usage",
                "--by",
                "year",
                "--timezone",
                "Europe/Paris",
            ]),
            &config_path,
        );
        assert_eq!(settings.timezone, "Europe/Paris");
        assert_eq!(settings.command, Command::Usage { by: PeriodUnit::Year });

        let persisted = LastUsedParams::load_from(&config_path);
        assert_eq!(persisted.timezone, Some("Europe/Paris".to_string()));
        assert_eq!(persisted.period, Some(PeriodUnit::Year));
    }

    #[test]
    fn test_load_with_last_used_keeps_period_for_other_commands() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams {
            timezone: Some("UTC".to_string()),
            period: Some(PeriodUnit::Month),
            ..Default::default()
        }
        .save_to(&config_path)
        .expect("save");

        Settings::load_with_last_used_impl(args(&["meter-analyzer", "appliances"]), &config_path);

        let persisted = LastUsedParams::load_from(&config_path);
        assert_eq!(persisted.period, Some(PeriodUnit::Month));
    }

    #[test]
    fn test_load_with_last_used_clear_removes_file() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams::default().save_to(&config_path).expect("save");

        Settings::load_with_last_used_impl(
            args(&["meter-analyzer", "readings", "--clear"]),
            &config_path,
        );

        assert!(!config_path.exists());
    }

    #[test]
    fn test_load_with_last_used_debug_overrides_log_level() {
        let tmp = TempDir::new().expect("tempdir");
        let settings = Settings::load_with_last_used_impl(
            args(&["meter-analyzer", "readings", "--debug", "--timezone", "UTC"]),
            &tmp_config_path(&tmp),
        );
        assert_eq!(settings.log_level, "DEBUG");
    }

    #[test]
    fn test_resolved_data_dir_prefers_explicit() {
        let settings = Settings::parse_from(["meter-analyzer", "readings", "--data-dir", "/tmp/m"]);
        assert_eq!(settings.resolved_data_dir(), PathBuf::from("/tmp/m"));

        let settings = Settings::parse_from(["meter-analyzer", "readings"]);
        assert!(settings
            .resolved_data_dir()
            .ends_with(Path::new(APP_DIR_NAME).join("data")));
    }
}
