//! Per-window aggregation of episode metrics.

use crate::message::EpisodeMetrics;
use crate::schema::{Role, VariableSpec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One point of a basic variable's line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinePoint {
    pub episode: u64,
    pub value: f64,
}

/// One window of an advanced variable's band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandPoint {
    pub episode: u64,
    pub min: f64,
    pub avg: f64,
    pub max: f64,
}

/// History of one variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "points", rename_all = "snake_case")]
pub enum SeriesData {
    Line(Vec<LinePoint>),
    Band(Vec<BandPoint>),
}

impl SeriesData {
    fn for_role(role: Role) -> Self {
        match role {
            Role::Basic => SeriesData::Line(Vec::new()),
            Role::Advanced => SeriesData::Band(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            SeriesData::Line(points) => points.len(),
            SeriesData::Band(points) => points.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u64,
    last: f64,
    min: f64,
    max: f64,
    sum: f64,
}

impl Window {
    fn new(value: f64) -> Self {
        Self {
            count: 1,
            last: value,
            min: value,
            max: value,
            sum: value,
        }
    }

    fn push(&mut self, value: f64) {
        self.count += 1;
        self.last = value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum += value;
    }
}

/// Groups episodes into windows of `plot_frequency` and keeps one point per
/// variable per closed window.
///
/// Basic variables keep the last value of the window, advanced variables
/// its min, average and max. A point is stamped with the last episode
/// number in its window.
pub struct MetricsAggregator {
    plot_frequency: u64,
    history: Vec<(&'static VariableSpec, SeriesData)>,
    window: BTreeMap<&'static str, Window>,
    window_episodes: u64,
    window_last_episode: u64,
    episodes_seen: u64,
}

impl MetricsAggregator {
    pub fn new(variables: &[&'static VariableSpec], plot_frequency: u64) -> Self {
        Self {
            plot_frequency: plot_frequency.max(1),
            history: variables
                .iter()
                .map(|spec| (*spec, SeriesData::for_role(spec.role)))
                .collect(),
            window: BTreeMap::new(),
            window_episodes: 0,
            window_last_episode: 0,
            episodes_seen: 0,
        }
    }

    /// Adds one episode. Returns true if this closed a window.
    pub fn ingest(&mut self, metrics: &EpisodeMetrics) -> bool {
        for (name, value) in &metrics.values {
            self.window
                .entry(*name)
                .and_modify(|w| w.push(*value))
                .or_insert_with(|| Window::new(*value));
        }
        self.window_episodes += 1;
        self.window_last_episode = metrics.episode;
        self.episodes_seen += 1;

        if self.window_episodes >= self.plot_frequency {
            self.close_window();
            true
        } else {
            false
        }
    }

    /// Closes a partially filled window. Returns false if it was empty.
    pub fn flush(&mut self) -> bool {
        if self.window_episodes == 0 {
            return false;
        }
        self.close_window();
        true
    }

    fn close_window(&mut self) {
        let episode = self.window_last_episode;
        for (spec, series) in &mut self.history {
            let Some(window) = self.window.get(spec.name) else {
                continue;
            };
            match series {
                SeriesData::Line(points) => points.push(LinePoint {
                    episode,
                    value: window.last,
                }),
                SeriesData::Band(points) => points.push(BandPoint {
                    episode,
                    min: window.min,
                    avg: window.sum / window.count as f64,
                    max: window.max,
                }),
            }
        }
        self.window.clear();
        self.window_episodes = 0;
    }

    /// Variables with their closed-window history, in configured order.
    pub fn series(&self) -> &[(&'static VariableSpec, SeriesData)] {
        &self.history
    }

    pub fn episodes_seen(&self) -> u64 {
        self.episodes_seen
    }

    /// Episodes in the currently open window.
    pub fn pending(&self) -> u64 {
        self.window_episodes
    }
}
