//! Decoding of metrics messages.

use crate::error::MetricsError;
use crate::schema::VariableSpec;
use rktl_env::DiagnosticStatus;
use std::collections::BTreeMap;

/// Key carrying the episode number.
pub const EPISODE_KEY: &str = "episode";

/// The tracked values of one episode.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeMetrics {
    pub hardware_id: String,
    pub episode: u64,

    /// Tracked variables present in the message
    pub values: BTreeMap<&'static str, f64>,
}

impl EpisodeMetrics {
    /// Extracts the episode number and every tracked variable present.
    ///
    /// Keys that are not tracked are ignored. A tracked key with a value
    /// that is not a finite number makes the whole message malformed.
    pub fn decode(
        status: &DiagnosticStatus,
        tracked: &[&'static VariableSpec],
    ) -> Result<Self, MetricsError> {
        let raw_episode = status.get(EPISODE_KEY).ok_or(MetricsError::MissingEpisode)?;
        let episode = raw_episode
            .trim()
            .parse::<u64>()
            .map_err(|_| MetricsError::InvalidEpisode(raw_episode.to_string()))?;

        let mut values = BTreeMap::new();
        for spec in tracked {
            let Some(raw) = status.get(spec.name) else {
                continue;
            };
            let value = raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| MetricsError::InvalidValue {
                    key: spec.name.to_string(),
                    value: raw.to_string(),
                })?;
            values.insert(spec.name, value);
        }

        Ok(Self {
            hardware_id: status.hardware_id.clone(),
            episode,
            values,
        })
    }
}

/// Parses one NDJSON line into a status message.
pub fn parse_line(line: &str) -> Result<DiagnosticStatus, MetricsError> {
    serde_json::from_str(line).map_err(|e| MetricsError::Undecodable(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::PlotSchema;

    fn tracked() -> Vec<&'static VariableSpec> {
        PlotSchema
            .resolve(&["total_steps".to_string()], &["net_reward".to_string()])
            .unwrap()
    }

    #[test]
    fn test_decode_tracked_values() {
        let status = DiagnosticStatus::new("env", "run-7")
            .with_value("episode", 3)
            .with_value("net_reward", -12.5)
            .with_value("total_steps", 300)
            .with_value("untracked", "whatever");

        let metrics = EpisodeMetrics::decode(&status, &tracked()).unwrap();
        assert_eq!(metrics.episode, 3);
        assert_eq!(metrics.hardware_id, "run-7");
        assert_eq!(metrics.values.get("net_reward"), Some(&-12.5));
        assert_eq!(metrics.values.len(), 2);
    }

    #[test]
    fn test_missing_tracked_value_is_not_an_error() {
        let status = DiagnosticStatus::new("env", "run").with_value("episode", 1);
        let metrics = EpisodeMetrics::decode(&status, &tracked()).unwrap();
        assert!(metrics.values.is_empty());
    }

    #[test]
    fn test_malformed_messages() {
        let no_episode = DiagnosticStatus::new("env", "run").with_value("net_reward", 1.0);
        assert_eq!(
            EpisodeMetrics::decode(&no_episode, &tracked()),
            Err(MetricsError::MissingEpisode)
        );

        let bad_episode = DiagnosticStatus::new("env", "run").with_value("episode", "-2");
        assert!(matches!(
            EpisodeMetrics::decode(&bad_episode, &tracked()),
            Err(MetricsError::InvalidEpisode(_))
        ));

        let nan = DiagnosticStatus::new("env", "run")
            .with_value("episode", 1)
            .with_value("net_reward", "NaN");
        assert!(matches!(
            EpisodeMetrics::decode(&nan, &tracked()),
            Err(MetricsError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_parse_line() {
        let line = r#"{"name":"env","hardware_id":"run-1","values":[{"key":"episode","value":"4"}]}"#;
        let status = parse_line(line).unwrap();
        assert_eq!(status.get("episode"), Some("4"));

        assert!(matches!(parse_line("{not json"), Err(MetricsError::Undecodable(_))));
    }
}
