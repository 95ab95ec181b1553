//! Harness configuration, loadable from YAML.

use crate::driver::DriverConfig;
use crate::error::ConfigError;
use crate::reference_env::EnvConfig;
use rktl_env::TickingClock;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration for a co-simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Master seed for action sampling
    pub seed: u64,

    /// Clock tick rate in Hz (simulated time)
    pub tick_rate_hz: u32,

    /// Simulated seconds per wall-clock second
    pub real_time_factor: f64,

    /// Capacity of each sensor channel
    pub bus_capacity: usize,

    /// Wall-clock wait for the first tick
    pub first_tick_timeout_secs: f64,

    /// Wall-clock limit per environment call
    pub call_timeout_secs: Option<f64>,

    /// Reference environment settings
    pub env: EnvConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            tick_rate_hz: 100,
            real_time_factor: 1.0,
            bus_capacity: 256,
            first_tick_timeout_secs: 5.0,
            call_timeout_secs: None,
            env: EnvConfig::default(),
        }
    }
}

impl HarnessConfig {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: HarnessConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate_hz == 0 {
            return Err(ConfigError::Invalid("tick_rate_hz must be positive".to_string()));
        }
        if !(self.real_time_factor.is_finite() && self.real_time_factor > 0.0) {
            return Err(ConfigError::Invalid("real_time_factor must be positive".to_string()));
        }
        if self.tick_period().is_zero() {
            return Err(ConfigError::Invalid("tick_rate_hz is too high to represent".to_string()));
        }
        if TickingClock::wall_period(self.tick_period(), self.real_time_factor).is_zero() {
            return Err(ConfigError::Invalid(
                "real_time_factor leaves a zero wall-clock tick period".to_string(),
            ));
        }
        if !(self.first_tick_timeout_secs.is_finite() && self.first_tick_timeout_secs > 0.0) {
            return Err(ConfigError::Invalid("first_tick_timeout_secs must be positive".to_string()));
        }
        if let Some(secs) = self.call_timeout_secs {
            if !(secs.is_finite() && secs > 0.0) {
                return Err(ConfigError::Invalid("call_timeout_secs must be positive".to_string()));
            }
        }
        if self.env.step_period().is_zero() {
            return Err(ConfigError::Invalid("env.step_period_secs must be positive".to_string()));
        }
        Ok(())
    }

    /// Simulated time between ticks.
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs(1) / self.tick_rate_hz.max(1)
    }

    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            seed: self.seed,
            first_tick_timeout: secs(self.first_tick_timeout_secs),
            call_timeout: self.call_timeout_secs.map(secs),
        }
    }
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = HarnessConfig::default();
        config.validate().unwrap();

        assert_eq!(config.tick_period(), Duration::from_millis(10));
        assert_eq!(config.driver_config().call_timeout, None);
        assert_eq!(config.env.step_period(), Duration::from_millis(100));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
seed: 7
tick_rate_hz: 50
call_timeout_secs: 2.5
env:
  run_id: nightly
  reward:
    win: 500.0
"#;
        let config = HarnessConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.seed, 7);
        assert_eq!(config.tick_period(), Duration::from_millis(20));
        assert_eq!(config.driver_config().call_timeout, Some(Duration::from_millis(2500)));
        assert_eq!(config.env.run_id, "nightly");
        assert_eq!(config.env.reward.win, 500.0);
        assert_eq!(config.env.reward.loss, -505.0);
        assert_eq!(config.env.sync.settle_ticks, 2);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            HarnessConfig::from_yaml("tick_rate_hz: 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            HarnessConfig::from_yaml("real_time_factor: -1.0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            HarnessConfig::from_yaml("tick_rate_hz: 2000000000"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            HarnessConfig::from_yaml("real_time_factor: 1.0e12"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            HarnessConfig::from_yaml("seed: [1, 2]"),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "seed: 99\nreal_time_factor: 4.0").unwrap();

        let config = HarnessConfig::load(file.path()).unwrap();
        assert_eq!(config.seed, 99);
        assert_eq!(config.real_time_factor, 4.0);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            HarnessConfig::load("/nonexistent/harness.yaml"),
            Err(ConfigError::Io(_))
        ));
    }
}
