//! Error types for the co-simulation protocol.

use rktl_env::EnvError;
use std::time::Duration;
use thiserror::Error;

/// Why a single fixture failed. Every variant is fatal for the run.
#[derive(Debug, Error)]
pub enum FixtureFailure {
    #[error("observation length: expected {expected}, got {actual}")]
    ObservationLength { expected: usize, actual: usize },

    #[error("observation[{index}]: expected {expected}, got {actual}")]
    ObservationMismatch {
        index: usize,
        expected: f64,
        actual: f64,
    },

    #[error("reward: expected {expected} to {places} places, got {actual}")]
    RewardMismatch {
        expected: f64,
        actual: f64,
        places: u32,
    },

    #[error("done: expected {expected}, got {actual}")]
    DoneMismatch { expected: bool, actual: bool },

    #[error("elapsed sim time {elapsed:?} exceeds budget {budget:?}")]
    BudgetExceeded { elapsed: Duration, budget: Duration },

    #[error("reset gate called {actual} times, expected {expected}")]
    ResetCountMismatch { expected: u32, actual: u32 },

    #[error("unexpected reset request (call {call_index} at {sim_time:?})")]
    UnexpectedReset { call_index: u32, sim_time: Duration },

    #[error("environment error: {0}")]
    Environment(#[from] EnvError),

    #[error("call did not return within {0:?} of wall time")]
    CallTimedOut(Duration),
}

/// Errors that abort a protocol run.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("clock never started within {0:?}")]
    ClockNeverStarted(Duration),

    #[error("fixture {index} ({label}) failed: {failure}")]
    Fixture {
        index: usize,
        label: String,
        #[source]
        failure: FixtureFailure,
    },

    #[error("invalid fixture {index}: {reason}")]
    InvalidFixture { index: usize, reason: String },

    #[error("rewards differ between passes at fixture {index}: {first} vs {second}")]
    NonDeterministic {
        index: usize,
        first: f64,
        second: f64,
    },

    #[error("unexpected reset request after fixture window {window} closed (call {call_index} at {sim_time:?})")]
    LateReset {
        window: u64,
        call_index: u32,
        sim_time: Duration,
    },

    #[error("reset gate received {actual} requests, fixtures accounted for {expected}")]
    UnaccountedResets { expected: u64, actual: u64 },

    #[error(transparent)]
    Env(#[from] EnvError),
}

impl DriverError {
    /// Wraps a fixture failure with the fixture's position and label.
    pub fn fixture(index: usize, label: &str, failure: FixtureFailure) -> Self {
        Self::Fixture {
            index,
            label: label.to_string(),
            failure,
        }
    }

    /// The underlying fixture failure, if any.
    pub fn failure(&self) -> Option<&FixtureFailure> {
        match self {
            DriverError::Fixture { failure, .. } => Some(failure),
            _ => None,
        }
    }
}

/// Configuration and fixture-script loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
