use serde::{Deserialize, Serialize};

use crate::constants::{
    BRAID_CONNECTION_THRESHOLD, CLUSTER_THRESHOLD, DEFAULT_DIMENSIONS, DEFAULT_MAX_BRAIDS,
    DEFAULT_MAX_EDGES, DEFAULT_MAX_SIGILS, MIN_DIMENSIONS, RECOGNITION_THRESHOLD,
    SIMILAR_THRESHOLD,
};
use crate::error::{EngineError, Result};

/// Bounds applied to the store and to persisted snapshots.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Retention {
    pub max_sigils: usize,
    pub max_braids: usize,
    pub max_edges: usize,
}

impl Default for Retention {
    fn default() -> Self {
        Self {
            max_sigils: DEFAULT_MAX_SIGILS,
            max_braids: DEFAULT_MAX_BRAIDS,
            max_edges: DEFAULT_MAX_EDGES,
        }
    }
}

/// The four similarity thresholds. They are tuned independently; none is
/// derived from another.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub similar: f64,
    pub recognition: f64,
    pub braid_connection: f64,
    pub cluster: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            similar: SIMILAR_THRESHOLD,
            recognition: RECOGNITION_THRESHOLD,
            braid_connection: BRAID_CONNECTION_THRESHOLD,
            cluster: CLUSTER_THRESHOLD,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub dimensions: usize,
    pub retention: Retention,
    pub thresholds: Thresholds,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_DIMENSIONS,
            retention: Retention::default(),
            thresholds: Thresholds::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.dimensions < MIN_DIMENSIONS {
            return Err(EngineError::InvalidConfig(format!(
                "dimensions must be at least {MIN_DIMENSIONS}, got {}",
                self.dimensions
            )));
        }
        let limits = [
            ("retention.max_sigils", self.retention.max_sigils),
            ("retention.max_braids", self.retention.max_braids),
            ("retention.max_edges", self.retention.max_edges),
        ];
        for (name, value) in limits {
            if value == 0 {
                return Err(EngineError::InvalidConfig(format!("{name} must be positive")));
            }
        }
        let thresholds = [
            ("thresholds.similar", self.thresholds.similar),
            ("thresholds.recognition", self.thresholds.recognition),
            ("thresholds.braid_connection", self.thresholds.braid_connection),
            ("thresholds.cluster", self.thresholds.cluster),
        ];
        for (name, value) in thresholds {
            if !(0.0..=1.0).contains(&value) {
                return Err(EngineError::InvalidConfig(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.dimensions, 64);
        assert_eq!(config.retention.max_sigils, 500);
        assert_eq!(config.retention.max_braids, 50);
        assert_eq!(config.retention.max_edges, 200);
        assert_eq!(config.thresholds.similar, 0.7);
        assert_eq!(config.thresholds.recognition, 0.65);
        assert_eq!(config.thresholds.braid_connection, 0.6);
        assert_eq!(config.thresholds.cluster, 0.65);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"thresholds": {"similar": 0.9}}"#).unwrap();
        assert_eq!(config.thresholds.similar, 0.9);
        assert_eq!(config.thresholds.braid_connection, 0.6);
        assert_eq!(config.retention.max_sigils, 500);
    }

    #[test]
    fn test_validate_rejects() {
        let mut config = EngineConfig::default();
        config.thresholds.cluster = 1.5;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.retention.max_sigils = 0;
        assert!(config.validate().is_err());

        let config = EngineConfig {
            dimensions: 8,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
