//! Configuration for the price simulator

use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{FeedError, Result};

/// Default tick period in milliseconds
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 5000;

/// Default half-width of the per-tick random delta (0.0005)
pub const DEFAULT_MAX_DELTA: Decimal = Decimal::from_parts(5, 0, 0, false, 4);

/// Simulator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Time between ticks in milliseconds
    pub tick_interval_ms: u64,

    /// Deltas are drawn uniformly from `[-max_delta, +max_delta]`
    pub max_delta: Decimal,

    /// Seed the built-in major pairs when nothing is persisted
    pub seed_defaults: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            max_delta: DEFAULT_MAX_DELTA,
            seed_defaults: true,
        }
    }
}

impl FeedConfig {
    /// Tick period as a duration
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Reject settings the simulator cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            return Err(FeedError::Config("tick_interval_ms must be greater than zero".to_string()));
        }
        if self.max_delta <= Decimal::ZERO {
            return Err(FeedError::Config(format!("max_delta must be positive, got {}", self.max_delta)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[test]
    fn test_defaults() {
        let config = FeedConfig::default();
        assert_eq!(config.tick_interval(), Duration::from_secs(5));
        assert_eq!(config.max_delta, Decimal::new(5, 4));
        assert_ok!(config.validate());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let config = FeedConfig { tick_interval_ms: 0, ..Default::default() };
        assert!(matches!(config.validate(), Err(FeedError::Config(_))));

        let config = FeedConfig { max_delta: Decimal::ZERO, ..Default::default() };
        assert!(matches!(config.validate(), Err(FeedError::Config(_))));
    }
}
