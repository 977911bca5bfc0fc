//! Reporter configuration

use serde::{Deserialize, Serialize};

use crate::error::ProgressError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReporterConfig {
    /// Minimum fraction gap between emitted loop updates
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Capacity of the monitor broadcast channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_threshold() -> f64 {
    crate::drive::DEFAULT_THRESHOLD
}

fn default_channel_capacity() -> usize {
    crate::emit::DEFAULT_CHANNEL_CAPACITY
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl ReporterConfig {
    /// Validate the configuration
    ///
    /// The threshold must be finite and non-negative; zero means every
    /// completed element emits an update.
    pub fn validate(&self) -> Result<(), ProgressError> {
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(ProgressError::InvalidThreshold(self.threshold));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReporterConfig::default();
        assert_eq!(config.threshold, crate::drive::DEFAULT_THRESHOLD);
        assert_eq!(config.channel_capacity, crate::emit::DEFAULT_CHANNEL_CAPACITY);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_deserialization_fills_defaults() {
        let config: ReporterConfig = serde_json::from_str(r#"{"threshold": 0.01}"#).unwrap();
        assert_eq!(config.threshold, 0.01);
        assert_eq!(config.channel_capacity, crate::emit::DEFAULT_CHANNEL_CAPACITY);
    }

    #[test]
    fn test_rejects_malformed_threshold() {
        for bad in [f64::NAN, f64::INFINITY, -0.1] {
            let config = ReporterConfig {
                threshold: bad,
                ..Default::default()
            };
            assert!(matches!(config.validate(), Err(ProgressError::InvalidThreshold(_))));
        }
    }
}
