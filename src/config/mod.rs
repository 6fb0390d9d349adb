mod file_config;

pub use file_config::{FileConfig, WeeklyRankingConfig};

use crate::background_jobs::WeeklySchedule;
use crate::server::RequestsLoggingLevel;
use anyhow::{anyhow, bail, Result};
use chrono::{FixedOffset, Weekday};
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

/// File name of the catalog database inside `db_dir`.
pub const CATALOG_DB_FILE_NAME: &str = "catalog.db";

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub busy_timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub db_dir: PathBuf,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub busy_timeout: Duration,

    /// When the weekly ranking refresh fires
    pub weekly_ranking: WeeklySchedule,
}

pub const DEFAULT_REFRESH_WEEKDAY: Weekday = Weekday::Mon;
pub const DEFAULT_REFRESH_HOUR: u32 = 0;
pub const DEFAULT_REFRESH_MINUTE: u32 = 5;

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        // TOML overrides CLI for each field
        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| anyhow!("db_dir must be specified via --db-dir or in config file"))?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let frontend_dir_path = file
            .frontend_dir_path
            .or_else(|| cli.frontend_dir_path.clone());

        let busy_timeout = Duration::from_millis(file.busy_timeout_ms.unwrap_or(cli.busy_timeout_ms));

        let weekly_ranking = resolve_weekly_schedule(&file.weekly_ranking.unwrap_or_default())?;

        Ok(Self {
            db_dir,
            port,
            metrics_port,
            logging_level,
            frontend_dir_path,
            busy_timeout,
            weekly_ranking,
        })
    }

    pub fn catalog_db_path(&self) -> PathBuf {
        self.db_dir.join(CATALOG_DB_FILE_NAME)
    }
}

fn resolve_weekly_schedule(config: &WeeklyRankingConfig) -> Result<WeeklySchedule> {
    let weekday = match &config.weekday {
        Some(s) => parse_weekday(s)?,
        None => DEFAULT_REFRESH_WEEKDAY,
    };
    let hour = config.hour.unwrap_or(DEFAULT_REFRESH_HOUR);
    if hour > 23 {
        bail!("weekly_ranking.hour must be between 0 and 23, got {}", hour);
    }
    let minute = config.minute.unwrap_or(DEFAULT_REFRESH_MINUTE);
    if minute > 59 {
        bail!("weekly_ranking.minute must be between 0 and 59, got {}", minute);
    }
    let utc_offset = match &config.utc_offset {
        Some(s) => parse_utc_offset(s)?,
        None => FixedOffset::east_opt(0).ok_or_else(|| anyhow!("invalid UTC offset"))?,
    };

    WeeklySchedule::new(weekday, hour, minute, utc_offset)
        .ok_or_else(|| anyhow!("Invalid weekly ranking time {:02}:{:02}", hour, minute))
}

/// Accepts "mon".."sun" and full day names, case-insensitive.
fn parse_weekday(s: &str) -> Result<Weekday> {
    s.trim()
        .parse::<Weekday>()
        .map_err(|_| anyhow!("weekly_ranking.weekday '{}' is not a day of the week", s))
}

/// Accepts "Z", "+HH:MM" and "-HH:MM".
fn parse_utc_offset(s: &str) -> Result<FixedOffset> {
    let invalid = || anyhow!("weekly_ranking.utc_offset '{}' must look like +HH:MM, -HH:MM or Z", s);
    let s = s.trim();
    if s.eq_ignore_ascii_case("z") {
        return FixedOffset::east_opt(0).ok_or_else(invalid);
    }

    let (sign, rest) = if let Some(rest) = s.strip_prefix('+') {
        (1, rest)
    } else if let Some(rest) = s.strip_prefix('-') {
        (-1, rest)
    } else {
        return Err(invalid());
    };
    let (hours, minutes) = rest.split_once(':').ok_or_else(invalid)?;
    if hours.len() != 2 || minutes.len() != 2 {
        return Err(invalid());
    }
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
