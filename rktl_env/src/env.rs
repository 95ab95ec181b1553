//! The reinforcement-learning environment contract.

use crate::error::EnvError;
use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Observation vector returned by `reset` and `step`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation(pub Vec<f64>);

impl Observation {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<f64>> for Observation {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

/// Result of a single `step`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    pub observation: Observation,
    pub reward: f64,
    pub done: bool,

    /// Environment-specific diagnostics; opaque to callers
    pub info: serde_json::Value,
}

/// The set of legal actions of an environment.
pub trait ActionSpace: Send + Sync {
    type Action: Clone + Debug + Send + Sync;

    /// Draws a uniformly random legal action.
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Self::Action;

    fn contains(&self, action: &Self::Action) -> bool;
}

/// A discrete action space `{0, 1, ..., n - 1}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discrete {
    pub n: usize,
}

impl Discrete {
    pub fn new(n: usize) -> Self {
        Self { n }
    }
}

impl ActionSpace for Discrete {
    type Action = usize;

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        rng.gen_range(0..self.n.max(1))
    }

    fn contains(&self, action: &usize) -> bool {
        *action < self.n
    }
}

/// Black-box reinforcement-learning environment.
///
/// Both calls block the caller until the environment has observed a
/// self-consistent snapshot of the world and computed its result.
#[async_trait]
pub trait Environment: Send {
    type Space: ActionSpace;

    /// The environment's declared action space.
    fn action_space(&self) -> &Self::Space;

    /// Starts a new episode and returns the initial observation.
    async fn reset(&mut self) -> Result<Observation, EnvError>;

    /// Applies `action` for one control period.
    async fn step(
        &mut self,
        action: <Self::Space as ActionSpace>::Action,
    ) -> Result<StepOutcome, EnvError>;
}
