use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_dir: Option<String>,
    pub port: Option<u16>,
    pub metrics_port: Option<u16>,
    pub logging_level: Option<String>,
    pub frontend_dir_path: Option<String>,
    pub busy_timeout_ms: Option<u64>,

    // Feature configs
    pub weekly_ranking: Option<WeeklyRankingConfig>,
}

/// `[weekly_ranking]` section: when the weekly refresh fires.
#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct WeeklyRankingConfig {
    /// "mon".."sun" or the full day name
    pub weekday: Option<String>,
    pub hour: Option<u32>,
    pub minute: Option<u32>,
    /// "+HH:MM", "-HH:MM" or "Z"
    pub utc_offset: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::parse(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
