//! The plotting node: metrics in, chart files out.

use crate::aggregator::MetricsAggregator;
use crate::chart::ChartDocument;
use crate::config::PlotConfig;
use crate::error::PlotError;
use crate::message::EpisodeMetrics;
use crate::schema::VariableSpec;
use rktl_env::DiagnosticStatus;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Counters reported when the node stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeStats {
    pub accepted: u64,
    pub dropped: u64,
    pub saves: u64,
    pub failed_saves: u64,
}

pub struct PlotNode {
    config: PlotConfig,
    variables: Vec<&'static VariableSpec>,
    aggregator: MetricsAggregator,
    hardware_id: String,
    stats: NodeStats,
}

impl PlotNode {
    /// Validates the configuration; unknown or misassigned variables fail here.
    pub fn new(config: PlotConfig) -> Result<Self, PlotError> {
        let variables = config.validate()?;
        let aggregator = MetricsAggregator::new(&variables, config.plot_frequency);
        info!(
            "Plotting {} variables into {} (plot every {}, save every {} episodes)",
            variables.len(),
            config.log_dir.display(),
            config.plot_frequency,
            config.save_frequency
        );
        Ok(Self {
            config,
            variables,
            aggregator,
            hardware_id: String::new(),
            stats: NodeStats::default(),
        })
    }

    pub fn config(&self) -> &PlotConfig {
        &self.config
    }

    pub fn aggregator(&self) -> &MetricsAggregator {
        &self.aggregator
    }

    pub fn stats(&self) -> NodeStats {
        self.stats
    }

    /// Handles one metrics message.
    ///
    /// Malformed messages are logged and dropped. Returns the chart path
    /// when this message triggered a save.
    pub async fn handle(&mut self, status: &DiagnosticStatus) -> Result<Option<PathBuf>, PlotError> {
        let metrics = match EpisodeMetrics::decode(status, &self.variables) {
            Ok(metrics) => metrics,
            Err(e) => {
                error!("Dropping metrics message from '{}': {}", status.hardware_id, e);
                self.stats.dropped += 1;
                return Ok(None);
            }
        };

        if !metrics.hardware_id.is_empty() {
            self.hardware_id = metrics.hardware_id.clone();
        }
        self.stats.accepted += 1;
        if self.aggregator.ingest(&metrics) {
            debug!("Closed plot window at episode {}", metrics.episode);
        }

        if self.aggregator.episodes_seen() % self.config.save_frequency == 0 {
            self.save().await.map(Some)
        } else {
            Ok(None)
        }
    }

    /// Closes any open window and writes the chart.
    pub async fn flush(&mut self) -> Result<PathBuf, PlotError> {
        self.aggregator.flush();
        self.save().await
    }

    async fn save(&mut self) -> Result<PathBuf, PlotError> {
        let document = ChartDocument::build(&self.hardware_id, &self.aggregator);
        match document.save(&self.config.log_dir).await {
            Ok(path) => {
                self.stats.saves += 1;
                info!(
                    "Saved chart for {} episodes to {}",
                    document.episodes,
                    path.display()
                );
                Ok(path)
            }
            Err(e) => {
                self.stats.failed_saves += 1;
                Err(e)
            }
        }
    }

    /// Consumes messages until the channel closes, then saves once more.
    ///
    /// Save failures are logged; the node keeps its history and carries on.
    pub async fn run(mut self, mut rx: mpsc::Receiver<DiagnosticStatus>) -> NodeStats {
        while let Some(status) = rx.recv().await {
            if let Err(e) = self.handle(&status).await {
                error!("Failed to save chart: {}", e);
            }
        }

        if self.aggregator.episodes_seen() > 0 {
            if let Err(e) = self.flush().await {
                error!("Failed to save final chart: {}", e);
            }
        }

        info!(
            "Plotting stopped: {} accepted, {} dropped, {} saves",
            self.stats.accepted, self.stats.dropped, self.stats.saves
        );
        self.stats
    }
}
