//! Plotting node configuration.

use crate::error::PlotError;
use crate::schema::{PlotSchema, VariableSpec};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for the plotting node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotConfig {
    /// Directory chart files are written to
    pub log_dir: PathBuf,

    /// Episodes per aggregation window
    pub plot_frequency: u64,

    /// Episodes between chart saves
    pub save_frequency: u64,

    /// Single-line variables
    pub basic: Vec<String>,

    /// Min/avg/max band variables
    pub advanced: Vec<String>,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            plot_frequency: 10,
            save_frequency: 100,
            basic: vec!["total_steps".to_string()],
            advanced: vec![
                "net_reward".to_string(),
                "episode_length".to_string(),
                "outcome".to_string(),
            ],
        }
    }
}

impl PlotConfig {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PlotError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from a YAML string and validate it.
    pub fn from_yaml(yaml: &str) -> Result<Self, PlotError> {
        let config: PlotConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks frequencies and resolves the variable lists against the schema.
    pub fn validate(&self) -> Result<Vec<&'static VariableSpec>, PlotError> {
        if self.plot_frequency == 0 {
            return Err(PlotError::InvalidConfig("plot_frequency must be positive".to_string()));
        }
        if self.save_frequency == 0 {
            return Err(PlotError::InvalidConfig("save_frequency must be positive".to_string()));
        }
        let variables = PlotSchema.resolve(&self.basic, &self.advanced)?;
        if variables.is_empty() {
            return Err(PlotError::InvalidConfig("no variables to plot".to_string()));
        }
        Ok(variables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let variables = PlotConfig::default().validate().unwrap();
        assert_eq!(variables.len(), 4);
    }

    #[test]
    fn test_yaml() {
        let yaml = r#"
log_dir: /tmp/rktl
plot_frequency: 5
save_frequency: 20
basic: [learning_rate]
advanced: [net_reward]
"#;
        let config = PlotConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.log_dir, PathBuf::from("/tmp/rktl"));
        assert_eq!(config.plot_frequency, 5);
        assert_eq!(config.basic, vec!["learning_rate"]);
    }

    #[test]
    fn test_zero_frequency_rejected() {
        assert!(matches!(
            PlotConfig::from_yaml("plot_frequency: 0"),
            Err(PlotError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_unknown_variable_rejected_at_load() {
        assert!(matches!(
            PlotConfig::from_yaml("advanced: [net_reward, goals_per_minute]"),
            Err(PlotError::UnknownVariable(_))
        ));
    }

    #[test]
    fn test_empty_variable_lists_rejected() {
        assert!(matches!(
            PlotConfig::from_yaml("basic: []\nadvanced: []"),
            Err(PlotError::InvalidConfig(_))
        ));
    }
}
