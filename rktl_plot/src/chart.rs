//! Chart documents and their on-disk form.
//!
//! A chart is saved as JSON: one axis per variable, a line series for basic
//! variables and a min/avg/max band for advanced ones. Rendering is left to
//! whatever reads the file.

use crate::aggregator::{MetricsAggregator, SeriesData};
use crate::error::PlotError;
use crate::schema::Role;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name used when an identifier sanitizes to nothing.
pub const UNNAMED: &str = "unnamed";

/// One axis of the chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartAxis {
    pub variable: String,
    pub label: String,
    pub role: Role,
    pub series: SeriesData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartDocument {
    pub title: String,
    pub hardware_id: String,

    /// Episodes ingested when the chart was built
    pub episodes: u64,

    pub axes: Vec<ChartAxis>,
}

impl ChartDocument {
    pub fn build(hardware_id: &str, aggregator: &MetricsAggregator) -> Self {
        let title = if hardware_id.is_empty() {
            "Training progress".to_string()
        } else {
            format!("Training progress: {}", hardware_id)
        };

        Self {
            title,
            hardware_id: hardware_id.to_string(),
            episodes: aggregator.episodes_seen(),
            axes: aggregator
                .series()
                .iter()
                .map(|(spec, series)| ChartAxis {
                    variable: spec.name.to_string(),
                    label: spec.label.to_string(),
                    role: spec.role,
                    series: series.clone(),
                })
                .collect(),
        }
    }

    /// File name for this chart inside the log directory.
    pub fn file_name(&self) -> String {
        format!("{}.json", sanitize_identifier(&self.hardware_id))
    }

    /// Writes the chart under `log_dir`, replacing any previous save.
    ///
    /// The document goes to a temporary sibling first and is renamed into
    /// place, so readers never see a half-written file.
    pub async fn save(&self, log_dir: &Path) -> Result<PathBuf, PlotError> {
        tokio::fs::create_dir_all(log_dir).await?;

        let path = log_dir.join(self.file_name());
        let tmp = log_dir.join(format!(".{}.tmp", self.file_name()));
        let json = serde_json::to_string_pretty(self)?;

        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!("Saved chart to {}", path.display());
        Ok(path)
    }
}

/// Reduces a free-form identifier to a safe file stem.
///
/// Keeps ASCII alphanumerics, `_`, `-` and `.`; everything else becomes `_`.
/// Leading dots are stripped so the result is never hidden, `.` or `..`.
pub fn sanitize_identifier(raw: &str) -> String {
    let mapped: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = mapped.trim_start_matches('.');
    if trimmed.is_empty() {
        UNNAMED.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::EpisodeMetrics;
    use crate::schema::PlotSchema;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn aggregator() -> MetricsAggregator {
        let variables = PlotSchema
            .resolve(&["total_steps".to_string()], &["net_reward".to_string()])
            .unwrap();
        let mut agg = MetricsAggregator::new(&variables, 2);
        for n in 1..=4u64 {
            let mut values = BTreeMap::new();
            values.insert("total_steps", (n * 100) as f64);
            values.insert("net_reward", n as f64);
            agg.ingest(&EpisodeMetrics {
                hardware_id: "car-1".to_string(),
                episode: n,
                values,
            });
        }
        agg
    }

    #[test]
    fn test_sanitize_identifier() {
        assert_eq!(sanitize_identifier("run-7_b.v2"), "run-7_b.v2");
        assert_eq!(sanitize_identifier("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(sanitize_identifier(".."), UNNAMED);
        assert_eq!(sanitize_identifier(""), UNNAMED);
        assert_eq!(sanitize_identifier(".hidden"), "hidden");
        assert_eq!(sanitize_identifier("a b\\c"), "a_b_c");
        assert_eq!(sanitize_identifier("wagen-ü"), "wagen-_");
    }

    #[test]
    fn test_build_document() {
        let doc = ChartDocument::build("car-1", &aggregator());

        assert_eq!(doc.title, "Training progress: car-1");
        assert_eq!(doc.episodes, 4);
        assert_eq!(doc.axes.len(), 2);
        assert_eq!(doc.axes[0].variable, "total_steps");
        assert_eq!(doc.axes[0].role, Role::Basic);
        assert_eq!(doc.axes[1].series.len(), 2);
        assert_eq!(doc.file_name(), "car-1.json");
    }

    #[tokio::test]
    async fn test_save_stays_inside_log_dir() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("plots");
        let doc = ChartDocument::build("../escape", &aggregator());

        let path = doc.save(&log_dir).await.unwrap();
        assert_eq!(path.parent(), Some(log_dir.as_path()));
        assert_eq!(path.file_name().unwrap(), "_escape.json");

        let loaded: ChartDocument =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded, doc);

        // Only the chart remains; the temporary file was renamed away.
        assert_eq!(std::fs::read_dir(&log_dir).unwrap().count(), 1);
    }

    proptest! {
        #[test]
        fn prop_sanitized_is_a_plain_file_stem(raw in ".{0,40}") {
            let name = sanitize_identifier(&raw);
            prop_assert!(!name.is_empty());
            prop_assert!(!name.starts_with('.'));
            prop_assert!(!name.contains('/') && !name.contains('\\'));
            prop_assert!(name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')));

            let path = Path::new(&name);
            prop_assert_eq!(path.components().count(), 1);
        }
    }
}
