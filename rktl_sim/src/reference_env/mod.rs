//! Reference car-and-ball environment.
//!
//! A complete environment-under-test built on the sensor bus and reset
//! endpoint. It publishes a control command, lets simulated time run for
//! one step period, then waits for a settled snapshot that is strictly
//! newer than the end of the wait. Stale messages never reach an
//! observation.
//!
//! Actions are `Discrete(9)`: throttle in {-1, 0, 1} times curvature in
//! {-1, 0, 1}, scaled by the configured limits.

pub mod encoding;
pub mod reward;
pub mod sync;

pub use encoding::{encode, OBSERVATION_SIZE};
pub use reward::{FieldConfig, RewardConfig, RewardModel};
pub use sync::{Snapshot, SnapshotSynchronizer, SyncPolicy};

use async_trait::async_trait;
use rktl_env::{
    ActionSpace, ClockSource, ControlCommand, DiagnosticStatus, Discrete, EnvError, Environment,
    MatchState, Observation, ResetClient, SensorBus, Stamped, StepOutcome,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Name used on the diagnostics published at the end of each episode.
pub const DIAGNOSTICS_NAME: &str = "rocket_league_env";

const ACTION_LEVELS: [f64; 3] = [-1.0, 0.0, 1.0];

/// Launch configuration for [`RocketLeagueEnv`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    /// Identifies this run in published diagnostics
    pub run_id: String,

    /// Launch flag; the reference environment only logs it
    pub render: bool,

    /// Simulated time between command and observation
    pub step_period_secs: f64,

    pub max_throttle: f64,
    pub max_curvature: f64,

    pub sync: SyncPolicy,
    pub field: FieldConfig,
    pub reward: RewardConfig,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            run_id: "rktl".to_string(),
            render: false,
            step_period_secs: 0.1,
            max_throttle: 1.0,
            max_curvature: 1.0,
            sync: SyncPolicy::default(),
            field: FieldConfig::default(),
            reward: RewardConfig::default(),
        }
    }
}

impl EnvConfig {
    pub fn step_period(&self) -> Duration {
        Duration::try_from_secs_f64(self.step_period_secs).unwrap_or(Duration::ZERO)
    }
}

#[derive(Debug, Clone, Default)]
struct EpisodeStats {
    episode: u64,
    steps: u64,
    total_steps: u64,
    net_reward: f64,
    ball_goal_distance: f64,
    last_status: Option<MatchState>,
    reported: bool,
}

/// Reference environment: one car, one ball, one goal.
pub struct RocketLeagueEnv<C: ClockSource> {
    config: EnvConfig,
    clock: Arc<C>,
    bus: SensorBus,
    sensors: SnapshotSynchronizer,
    reset_client: ResetClient,
    action_space: Discrete,
    reward: RewardModel,
    previous: Option<Snapshot>,
    stats: EpisodeStats,
    diagnostics: Option<mpsc::UnboundedSender<DiagnosticStatus>>,
}

impl<C: ClockSource> RocketLeagueEnv<C> {
    /// Creates the environment and subscribes to the sensor channels.
    pub fn new(config: EnvConfig, clock: Arc<C>, bus: &SensorBus, reset_client: ResetClient) -> Self {
        if config.render {
            info!(run_id = %config.run_id, "Rendering requested; reference environment has no renderer");
        }

        Self {
            sensors: SnapshotSynchronizer::new(bus.subscribe(), config.sync),
            reward: RewardModel::new(config.field, config.reward),
            action_space: Discrete::new(ACTION_LEVELS.len() * ACTION_LEVELS.len()),
            bus: bus.clone(),
            clock,
            reset_client,
            previous: None,
            stats: EpisodeStats::default(),
            diagnostics: None,
            config,
        }
    }

    /// Publishes an episode summary on `tx` whenever an episode finishes.
    pub fn with_diagnostics(mut self, tx: mpsc::UnboundedSender<DiagnosticStatus>) -> Self {
        self.diagnostics = Some(tx);
        self
    }

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    /// Episodes started so far.
    pub fn episode(&self) -> u64 {
        self.stats.episode
    }

    /// Maps a discrete action to a control command.
    pub fn command_for(&self, action: usize) -> ControlCommand {
        let levels = ACTION_LEVELS.len();
        ControlCommand {
            throttle: ACTION_LEVELS[(action / levels) % levels] * self.config.max_throttle,
            curvature: ACTION_LEVELS[action % levels] * self.config.max_curvature,
        }
    }

    fn finish_episode(&mut self) {
        if self.stats.reported || self.stats.steps == 0 {
            return;
        }
        self.stats.reported = true;

        let outcome = match self.stats.last_status {
            Some(MatchState::VictoryTeamA) => 1,
            Some(MatchState::VictoryTeamB) => -1,
            _ => 0,
        };
        info!(
            episode = self.stats.episode,
            steps = self.stats.steps,
            net_reward = self.stats.net_reward,
            outcome,
            "Episode finished"
        );

        let Some(tx) = &self.diagnostics else {
            return;
        };
        let status = DiagnosticStatus::new(DIAGNOSTICS_NAME, self.config.run_id.clone())
            .with_value("episode", self.stats.episode)
            .with_value("net_reward", self.stats.net_reward)
            .with_value("episode_length", self.stats.steps)
            .with_value("ball_goal_distance", self.stats.ball_goal_distance)
            .with_value("outcome", outcome)
            .with_value("total_steps", self.stats.total_steps);
        if tx.send(status).is_err() {
            debug!("Diagnostics receiver gone");
        }
    }
}

#[async_trait]
impl<C: ClockSource> Environment for RocketLeagueEnv<C> {
    type Space = Discrete;

    fn action_space(&self) -> &Discrete {
        &self.action_space
    }

    async fn reset(&mut self) -> Result<Observation, EnvError> {
        self.finish_episode();

        self.reset_client.call().await?;
        let snapshot = self.sensors.acquire(self.clock.now()).await?;

        self.stats.episode += 1;
        self.stats.steps = 0;
        self.stats.net_reward = 0.0;
        self.stats.ball_goal_distance = self.reward.ball_goal_distance(&snapshot);
        self.stats.last_status = Some(snapshot.status);
        self.stats.reported = false;

        debug!(episode = self.stats.episode, stamp = ?snapshot.stamp, "Environment reset");
        let observation = encode(&snapshot, None);
        self.previous = Some(snapshot);
        Ok(observation)
    }

    async fn step(&mut self, action: usize) -> Result<StepOutcome, EnvError> {
        if !self.action_space.contains(&action) {
            return Err(EnvError::InvalidAction(format!(
                "{} not in Discrete({})",
                action, self.action_space.n
            )));
        }

        let started = self.clock.now();
        self.bus.publish_command(Stamped::new(started, self.command_for(action)));
        self.clock.sleep(self.config.step_period()).await?;
        let snapshot = self.sensors.acquire(self.clock.now()).await?;

        let observation = encode(&snapshot, self.previous.as_ref());
        let reward = self.reward.reward(&snapshot, self.previous.as_ref());
        let done = snapshot.status.is_terminal();

        self.stats.steps += 1;
        self.stats.total_steps += 1;
        self.stats.net_reward += reward;
        self.stats.ball_goal_distance = self.reward.ball_goal_distance(&snapshot);
        self.stats.last_status = Some(snapshot.status);
        self.previous = Some(snapshot);

        if done {
            self.finish_episode();
        }

        Ok(StepOutcome {
            observation,
            reward,
            done,
            info: json!({
                "episode": self.stats.episode,
                "step": self.stats.steps,
                "status": snapshot.status,
                "sim_time": snapshot.stamp.as_secs_f64(),
            }),
        })
    }
}
