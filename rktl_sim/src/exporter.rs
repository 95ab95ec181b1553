//! JSON exporter for protocol runs.
//!
//! Writes the run configuration, every script report and the control
//! commands the environment published, for offline inspection.

use crate::config::HarnessConfig;
use crate::driver::ProtocolReport;
use rktl_env::{ControlCommand, SensorBus, Stamped};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// A control command as seen on the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandSample {
    pub time_sec: f64,
    pub throttle: f64,
    pub curvature: f64,
}

impl From<Stamped<ControlCommand>> for CommandSample {
    fn from(msg: Stamped<ControlCommand>) -> Self {
        Self {
            time_sec: msg.stamp.as_secs_f64(),
            throttle: msg.value.throttle,
            curvature: msg.value.curvature,
        }
    }
}

/// Collects every command published on a bus.
#[derive(Clone, Default)]
pub struct CommandRecorder {
    samples: Arc<Mutex<Vec<CommandSample>>>,
}

impl CommandRecorder {
    /// Subscribes to `bus` and records until the bus closes.
    pub fn spawn(bus: &SensorBus) -> (Self, JoinHandle<()>) {
        let recorder = Self::default();
        let mut commands = bus.subscribe_commands();
        let samples = Arc::clone(&recorder.samples);

        let task = tokio::spawn(async move {
            loop {
                match commands.recv().await {
                    Ok(msg) => samples
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .push(msg.into()),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Command recorder lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        (recorder, task)
    }

    pub fn samples(&self) -> Vec<CommandSample> {
        self.samples.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Complete run export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolExport {
    /// Configuration the run used
    pub config: HarnessConfig,

    /// One report per script
    pub reports: Vec<ProtocolReport>,

    /// Commands published by the environment
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub commands: Vec<CommandSample>,

    /// All scripts passed
    pub passed: bool,
}

impl ProtocolExport {
    /// Creates a new export container.
    pub fn new(config: HarnessConfig) -> Self {
        Self {
            config,
            reports: Vec::new(),
            commands: Vec::new(),
            passed: true,
        }
    }

    /// Adds a script report.
    pub fn add_report(&mut self, report: ProtocolReport) {
        self.passed &= report.passed;
        self.reports.push(report);
    }

    pub fn set_commands(&mut self, commands: Vec<CommandSample>) {
        self.commands = commands;
    }

    /// Writes to a JSON file.
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
