//! RKTL training-metrics plotting node
//!
//! Subscribes to per-episode diagnostic messages, groups them into windows
//! of `plot_frequency` episodes and periodically saves a chart document:
//!
//! - **Basic** variables are drawn as a single line (last value per window)
//! - **Advanced** variables are drawn as a min/avg/max band
//!
//! Variables are declared in a static schema; configuration naming an
//! unknown variable, or one in the wrong role, is rejected at startup.
//! Malformed messages never stop the node.
//!
//! # Usage
//!
//! ```ignore
//! use rktl_plot::{PlotConfig, PlotNode};
//!
//! let node = PlotNode::new(PlotConfig::default())?;
//! let (tx, rx) = tokio::sync::mpsc::channel(64);
//! let stats = tokio::spawn(node.run(rx));
//! ```

mod aggregator;
mod chart;
mod config;
mod error;
mod message;
mod node;
mod schema;

pub use aggregator::{BandPoint, LinePoint, MetricsAggregator, SeriesData};
pub use chart::{sanitize_identifier, ChartAxis, ChartDocument, UNNAMED};
pub use config::PlotConfig;
pub use error::{MetricsError, PlotError};
pub use message::{parse_line, EpisodeMetrics, EPISODE_KEY};
pub use node::{NodeStats, PlotNode};
pub use schema::{PlotSchema, Role, VariableSpec};
