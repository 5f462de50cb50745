use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default number of matches kept per query in short-read mode
pub const DEFAULT_MAX_MATCHES_PER_READ: usize = 100;

/// Default proportion of an interval that must be covered for domination
pub const DEFAULT_MIN_COVER_PROPORTION: f32 = 0.90;

/// Default score proportion used by the domination test
pub const DEFAULT_MIN_SCORE_PROPORTION: f32 = 0.90;

/// Default number of per-record parse errors tolerated before a scan aborts
pub const DEFAULT_MAX_PARSE_ERRORS: usize = 1_000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{name} must be a proportion in [0, 1], got {value}")]
    InvalidProportion { name: &'static str, value: f32 },

    #[error("max_matches_per_read must be at least 1")]
    NoMatchesAllowed,
}

/// Settings consumed by the iterators and the retention step.
///
/// Nothing in the library reads process-wide state; every iterator receives
/// its own copy of this value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Upper bound on matches kept per query in short-read mode
    pub max_matches_per_read: usize,

    /// Use interval domination filtering instead of the bounded pool
    pub long_reads: bool,

    /// Fraction of an interval that another interval must overlap to dominate it
    pub min_cover_proportion: f32,

    /// A dominating match must satisfy `score * min_score_proportion > other score`
    pub min_score_proportion: f32,

    /// Parse errors tolerated before the scan is aborted
    pub max_parse_errors: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_matches_per_read: DEFAULT_MAX_MATCHES_PER_READ,
            long_reads: false,
            min_cover_proportion: DEFAULT_MIN_COVER_PROPORTION,
            min_score_proportion: DEFAULT_MIN_SCORE_PROPORTION,
            max_parse_errors: DEFAULT_MAX_PARSE_ERRORS,
        }
    }
}

impl ScanConfig {
    /// Load a configuration from a JSON file. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` if the file cannot be read, `ConfigError::Json`
    /// if it is not valid JSON, or a validation error for out-of-range values.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that proportions are in range and at least one match can be kept
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidProportion` or `ConfigError::NoMatchesAllowed`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_proportion("min_cover_proportion", self.min_cover_proportion)?;
        check_proportion("min_score_proportion", self.min_score_proportion)?;
        if self.max_matches_per_read == 0 {
            return Err(ConfigError::NoMatchesAllowed);
        }
        Ok(())
    }

    #[must_use]
    pub fn with_long_reads(mut self, long_reads: bool) -> Self {
        self.long_reads = long_reads;
        self
    }

    #[must_use]
    pub fn with_max_matches(mut self, max_matches_per_read: usize) -> Self {
        self.max_matches_per_read = max_matches_per_read;
        self
    }
}

fn check_proportion(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidProportion { name, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = ScanConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_parse_errors, 1_000);
        assert!((config.min_cover_proportion - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn test_rejects_out_of_range_proportion() {
        let config = ScanConfig {
            min_score_proportion: 1.5,
            ..ScanConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidProportion {
                name: "min_score_proportion",
                ..
            })
        ));
    }

    #[test]
    fn test_load_partial_json() {
        let mut temp = NamedTempFile::with_suffix(".json").unwrap();
        temp.write_all(br#"{"max_matches_per_read": 5, "long_reads": true}"#)
            .unwrap();
        temp.flush().unwrap();

        let config = ScanConfig::load_from_file(temp.path()).unwrap();
        assert_eq!(config.max_matches_per_read, 5);
        assert!(config.long_reads);
        assert_eq!(config.max_parse_errors, DEFAULT_MAX_PARSE_ERRORS);
    }

    #[test]
    fn test_zero_matches_rejected() {
        let config = ScanConfig::default().with_max_matches(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NoMatchesAllowed)
        ));
    }
}
