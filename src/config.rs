use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::{DatasetError, Result};

/// Scalars controlling dataset construction.
///
/// ```json
/// { "snapshot_minutes": 15, "batch_minutes": 30, "minutes_to_weather": 20 }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Snapshot duration; readings are floored to multiples of it and a gap
    /// of at least this long starts a new snapshot.
    pub snapshot_minutes: u32,
    /// Gap that must be exceeded to start a new batch. Defaults to
    /// `snapshot_minutes`.
    #[serde(default)]
    pub batch_minutes: Option<u32>,
    /// Maximum distance to the matched weather reading. Required when a
    /// weather table is supplied.
    #[serde(default)]
    pub minutes_to_weather: Option<u32>,
}

impl DatasetConfig {
    pub fn new(snapshot_minutes: u32) -> Self {
        Self {
            snapshot_minutes,
            batch_minutes: None,
            minutes_to_weather: None,
        }
    }

    pub fn with_batch_minutes(mut self, minutes: u32) -> Self {
        self.batch_minutes = Some(minutes);
        self
    }

    pub fn with_minutes_to_weather(mut self, minutes: u32) -> Self {
        self.minutes_to_weather = Some(minutes);
        self
    }

    pub fn batch_gap_minutes(&self) -> u32 {
        self.batch_minutes.unwrap_or(self.snapshot_minutes)
    }

    /// Check the scalars, given whether a weather table accompanies them.
    pub fn validate(&self, has_weather: bool) -> Result<()> {
        if self.snapshot_minutes == 0 {
            return Err(DatasetError::InvalidConfig(
                "snapshot_minutes must be positive".into(),
            ));
        }
        if self.batch_minutes == Some(0) {
            return Err(DatasetError::InvalidConfig(
                "batch_minutes must be positive".into(),
            ));
        }
        if has_weather && self.minutes_to_weather.is_none() {
            return Err(DatasetError::MissingWeatherTolerance);
        }
        Ok(())
    }

    /// Read a config from a JSON file.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weather_requires_tolerance() {
        let cfg = DatasetConfig::new(15);
        assert_eq!(cfg.validate(true), Err(DatasetError::MissingWeatherTolerance));
        assert_eq!(cfg.validate(false), Ok(()));
        assert_eq!(cfg.with_minutes_to_weather(10).validate(true), Ok(()));
    }

    #[test]
    fn zero_durations_are_rejected() {
        assert!(matches!(
            DatasetConfig::new(0).validate(false),
            Err(DatasetError::InvalidConfig(_))
        ));
        assert!(matches!(
            DatasetConfig::new(15).with_batch_minutes(0).validate(false),
            Err(DatasetError::InvalidConfig(_))
        ));
    }

    #[test]
    fn batch_gap_defaults_to_snapshot() {
        assert_eq!(DatasetConfig::new(15).batch_gap_minutes(), 15);
        assert_eq!(DatasetConfig::new(15).with_batch_minutes(45).batch_gap_minutes(), 45);
    }

    #[test]
    fn parses_json_with_defaults() {
        let cfg: DatasetConfig = serde_json::from_str(r#"{ "snapshot_minutes": 10 }"#).unwrap();
        assert_eq!(cfg, DatasetConfig::new(10));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "snapshot_minutes": 10, "batch_minutes": 30, "minutes_to_weather": 20 }"#,
        )
        .unwrap();
        let cfg = DatasetConfig::from_json_file(&path).unwrap();
        assert_eq!(
            cfg,
            DatasetConfig::new(10).with_batch_minutes(30).with_minutes_to_weather(20)
        );
    }
}
