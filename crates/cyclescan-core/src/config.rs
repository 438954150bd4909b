//! cyclescan.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::CoreError;
use crate::types::{Window, normalize_windows};

pub const DEFAULT_RETENTION_DAYS: u64 = 30;
pub const MAX_PAGE_LIMIT: usize = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleScanConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default = "default_windows")]
    pub windows: Vec<WindowConfig>,
    #[serde(default)]
    pub runway: RunwayConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub leaderboard: LeaderboardConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WindowConfig {
    pub name: String,
    pub hours: u64,
}

/// Day thresholds separating the runway severity buckets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RunwayConfig {
    pub critical_days: f64,
    pub warning_days: f64,
    pub ok_days: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    pub days: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardConfig {
    /// Window whose rate orders the leaderboards.
    pub sort_window: String,
    pub page_limit: usize,
}

impl Default for CycleScanConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            windows: default_windows(),
            runway: RunwayConfig::default(),
            retention: RetentionConfig::default(),
            leaderboard: LeaderboardConfig::default(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("cyclescan.redb"),
        }
    }
}

impl Default for RunwayConfig {
    fn default() -> Self {
        Self {
            critical_days: 30.0,
            warning_days: 90.0,
            ok_days: 365.0,
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            days: DEFAULT_RETENTION_DAYS,
        }
    }
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            sort_window: "short".to_string(),
            page_limit: 100,
        }
    }
}

fn default_windows() -> Vec<WindowConfig> {
    Window::defaults()
        .into_iter()
        .map(|w| WindowConfig {
            hours: w.span_ms / crate::types::MS_PER_HOUR,
            name: w.name,
        })
        .collect()
}

impl CycleScanConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: CycleScanConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// The configured windows, shortest first.
    pub fn windows(&self) -> Result<Vec<Window>, CoreError> {
        let windows = self
            .windows
            .iter()
            .map(|w| Window::from_hours(w.name.clone(), w.hours))
            .collect::<Result<Vec<_>, _>>()?;
        normalize_windows(windows)
    }

    pub fn window(&self, name: &str) -> Result<Window, CoreError> {
        self.windows()?
            .into_iter()
            .find(|w| w.name == name)
            .ok_or_else(|| CoreError::UnknownWindow(name.to_string()))
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        let windows = self.windows()?;
        if windows.is_empty() {
            return Err(CoreError::InvalidConfig(
                "at least one window is required".to_string(),
            ));
        }
        if !windows.iter().any(|w| w.name == self.leaderboard.sort_window) {
            return Err(CoreError::UnknownWindow(self.leaderboard.sort_window.clone()));
        }
        let r = &self.runway;
        let increasing = r.critical_days > 0.0
            && r.critical_days < r.warning_days
            && r.warning_days < r.ok_days;
        if !increasing {
            return Err(CoreError::InvalidConfig(format!(
                "runway thresholds must increase: {} < {} < {}",
                r.critical_days, r.warning_days, r.ok_days
            )));
        }
        if self.retention.days == 0 {
            return Err(CoreError::InvalidConfig(
                "retention must keep at least one day".to_string(),
            ));
        }
        if self.leaderboard.page_limit == 0 || self.leaderboard.page_limit > MAX_PAGE_LIMIT {
            return Err(CoreError::InvalidConfig(format!(
                "leaderboard page_limit must be within 1..={MAX_PAGE_LIMIT}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = CycleScanConfig::default();
        config.validate().unwrap();
        let names: Vec<_> = config.windows().unwrap().into_iter().map(|w| w.name).collect();
        assert_eq!(names, ["recent", "short", "long"]);
    }

    #[test]
    fn parse_minimal() {
        let config: CycleScanConfig = toml::from_str("").unwrap();
        assert_eq!(config.windows.len(), 3);
        assert_eq!(config.retention.days, 30);
        assert_eq!(config.leaderboard.sort_window, "short");
        config.validate().unwrap();
    }

    #[test]
    fn parse_custom_windows() {
        let toml_str = r#"
[store]
path = "/var/lib/cyclescan/store.redb"

[[windows]]
name = "day"
hours = 24

[[windows]]
name = "month"
hours = 720

[leaderboard]
sort_window = "day"
page_limit = 50
"#;
        let config: CycleScanConfig = toml::from_str(toml_str).unwrap();
        config.validate().unwrap();
        assert_eq!(config.window("month").unwrap().span_ms, 720 * 3_600_000);
        assert!(matches!(
            config.window("week"),
            Err(CoreError::UnknownWindow(_))
        ));
    }

    #[test]
    fn rejects_zero_hour_window() {
        let toml_str = r#"
[[windows]]
name = "short"
hours = 0
"#;
        let config: CycleScanConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.validate(),
            Err(CoreError::EmptyWindow("short".to_string()))
        );
    }

    #[test]
    fn rejects_unordered_thresholds() {
        let toml_str = r#"
[runway]
critical_days = 90.0
warning_days = 30.0
ok_days = 365.0
"#;
        let config: CycleScanConfig = toml::from_str(toml_str).unwrap();
        assert!(matches!(config.validate(), Err(CoreError::InvalidConfig(_))));
    }

    #[test]
    fn round_trips_through_toml() {
        let config: CycleScanConfig = toml::from_str("").unwrap();
        let rendered = config.to_toml_string().unwrap();
        let back: CycleScanConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(back.windows, config.windows);
    }
}
