//! Calculator configuration: marking catalog and safety range.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::MarkingCatalog;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid marking catalog entry: {0}")]
    InvalidCatalog(String),

    #[error("Invalid safe range: {0}")]
    InvalidRange(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Typical injection volume range in mL.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct VolumeRange {
    pub min_ml: f64,
    pub max_ml: f64,
}

impl Default for VolumeRange {
    fn default() -> Self {
        Self {
            min_ml: 0.01,
            max_ml: 1.0,
        }
    }
}

impl VolumeRange {
    /// Inclusive range check.
    pub fn contains(&self, volume_ml: f64) -> bool {
        volume_ml >= self.min_ml && volume_ml <= self.max_ml
    }
}

/// Static configuration consumed by the calculator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SafeDoseConfig {
    #[serde(default)]
    pub marking_catalog: MarkingCatalog,
    #[serde(default)]
    pub safe_range: VolumeRange,
}

impl SafeDoseConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        tracing::info!(
            standard_syringes = config.marking_catalog.labels(crate::models::SyringeType::Standard).len(),
            insulin_syringes = config.marking_catalog.labels(crate::models::SyringeType::Insulin).len(),
            min_ml = config.safe_range.min_ml,
            max_ml = config.safe_range.max_ml,
            "Loaded dose configuration"
        );
        Ok(config)
    }

    /// Load a JSON configuration file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject malformed catalogs and inverted ranges.
    pub fn validate(&self) -> ConfigResult<()> {
        self.marking_catalog
            .validate()
            .map_err(|(syringe_type, label)| {
                ConfigError::InvalidCatalog(format!("{} / {}", syringe_type, label))
            })?;

        let range = self.safe_range;
        if !range.min_ml.is_finite() || !range.max_ml.is_finite() || range.min_ml < 0.0 {
            return Err(ConfigError::InvalidRange(format!(
                "{} - {}",
                range.min_ml, range.max_ml
            )));
        }
        if range.min_ml >= range.max_ml {
            return Err(ConfigError::InvalidRange(format!(
                "min {} must be below max {}",
                range.min_ml, range.max_ml
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SyringeType;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = SafeDoseConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.safe_range, VolumeRange { min_ml: 0.01, max_ml: 1.0 });
    }

    #[test]
    fn test_range_is_inclusive() {
        let range = VolumeRange::default();
        assert!(range.contains(0.01));
        assert!(range.contains(1.0));
        assert!(!range.contains(1.01));
        assert!(!range.contains(0.005));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = SafeDoseConfig::from_json_str(r#"{"safe_range":{"min_ml":0.05,"max_ml":2.0}}"#)
            .unwrap();
        assert_eq!(config.safe_range.max_ml, 2.0);
        assert!(config
            .marking_catalog
            .markings(SyringeType::Standard, "3 ml")
            .is_ok());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = SafeDoseConfig::default();
        let json = config.to_json().unwrap();
        let back = SafeDoseConfig::from_json_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_rejects_malformed_catalog() {
        let json = r#"{"marking_catalog":{"entries":{"Standard":{"2 ml":[1.0,0.5]}}}}"#;
        assert!(matches!(
            SafeDoseConfig::from_json_str(json),
            Err(ConfigError::InvalidCatalog(_))
        ));
    }

    #[test]
    fn test_rejects_inverted_range() {
        let json = r#"{"safe_range":{"min_ml":2.0,"max_ml":1.0}}"#;
        assert!(matches!(
            SafeDoseConfig::from_json_str(json),
            Err(ConfigError::InvalidRange(_))
        ));
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", SafeDoseConfig::default().to_json().unwrap()).unwrap();

        let config = SafeDoseConfig::from_path(file.path()).unwrap();
        assert!(config.validate().is_ok());
    }
}
