//! Shaped reward for the car-and-ball task.

use super::sync::Snapshot;
use nalgebra::Vector2;
use rktl_env::{MatchState, PoseVelocity2D};
use serde::{Deserialize, Serialize};

/// Field geometry. The field is centered on the origin, goals on the x axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    pub length: f64,
    pub width: f64,

    /// Distance from a wall at which the wall penalty applies
    pub wall_threshold: f64,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            length: 5.0,
            width: 1.5,
            wall_threshold: 0.3,
        }
    }
}

impl FieldConfig {
    /// Center of the goal the car attacks.
    pub fn goal(&self) -> Vector2<f64> {
        Vector2::new(self.length / 2.0, 0.0)
    }

    pub fn near_wall(&self, state: &PoseVelocity2D) -> bool {
        state.x.abs() > self.length / 2.0 - self.wall_threshold
            || state.y.abs() > self.width / 2.0 - self.wall_threshold
    }
}

/// Reward weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    /// Added every step
    pub constant: f64,

    /// Times the car-to-ball distance
    pub ball_distance: f64,

    /// Times the squared ball-to-goal distance
    pub goal_distance: f64,

    /// Added while driving backwards
    pub reverse: f64,

    /// Added while the car is near a wall
    pub wall: f64,

    /// Times the decrease in ball-to-goal distance since the last step
    pub ball_progress: f64,

    pub win: f64,
    pub loss: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            constant: -0.5,
            ball_distance: -0.04,
            goal_distance: -0.26,
            reverse: -0.1,
            wall: -0.25,
            ball_progress: 0.0,
            win: 1000.0,
            loss: -505.0,
        }
    }
}

/// Computes the per-step reward from consecutive snapshots.
#[derive(Debug, Clone, Copy, Default)]
pub struct RewardModel {
    pub field: FieldConfig,
    pub weights: RewardConfig,
}

impl RewardModel {
    pub fn new(field: FieldConfig, weights: RewardConfig) -> Self {
        Self { field, weights }
    }

    pub fn ball_goal_distance(&self, snapshot: &Snapshot) -> f64 {
        (self.field.goal() - snapshot.ball.position()).norm()
    }

    pub fn reward(&self, current: &Snapshot, previous: Option<&Snapshot>) -> f64 {
        let w = &self.weights;
        let car_ball = (current.ball.position() - current.car.position()).norm();
        let ball_goal = self.ball_goal_distance(current);

        let mut reward = w.constant + w.ball_distance * car_ball + w.goal_distance * ball_goal.powi(2);

        if current.car.linear_speed < 0.0 {
            reward += w.reverse;
        }
        if self.field.near_wall(&current.car) {
            reward += w.wall;
        }
        if let Some(previous) = previous {
            reward += w.ball_progress * (self.ball_goal_distance(previous) - ball_goal);
        }

        match current.status {
            MatchState::VictoryTeamA => reward + w.win,
            MatchState::VictoryTeamB => reward + w.loss,
            MatchState::Ongoing | MatchState::Paused => reward,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::time::Duration;

    fn snapshot(car: PoseVelocity2D, ball: PoseVelocity2D, status: MatchState) -> Snapshot {
        Snapshot {
            stamp: Duration::from_millis(100),
            car,
            ball,
            status,
        }
    }

    #[test]
    fn test_kickoff_reward() {
        let model = RewardModel::default();
        let s = snapshot(PoseVelocity2D::new(0.0, 0.0, 1.0), PoseVelocity2D::origin(), MatchState::Ongoing);

        assert_relative_eq!(model.reward(&s, None), -2.125, epsilon = 1e-12);
    }

    #[test]
    fn test_win_while_reversing() {
        let model = RewardModel::default();
        let s = snapshot(
            PoseVelocity2D::new(0.0, 0.0, -1.0),
            PoseVelocity2D::new(1.0, 0.0, 0.0),
            MatchState::VictoryTeamA,
        );

        assert_relative_eq!(model.reward(&s, None), 998.775, epsilon = 1e-9);
    }

    #[test]
    fn test_loss_near_wall() {
        let model = RewardModel::default();
        let s = snapshot(
            PoseVelocity2D::new(1.0, 0.5, 0.0),
            PoseVelocity2D::new(-2.3, 1.0, 0.0),
            MatchState::VictoryTeamB,
        );

        assert!(model.field.near_wall(&s.car));
        assert_relative_eq!(model.reward(&s, None), -512.1339065541463, epsilon = 1e-9);
    }

    #[test]
    fn test_ball_progress_uses_previous_snapshot() {
        let model = RewardModel::new(
            FieldConfig::default(),
            RewardConfig {
                ball_progress: 10.0,
                ..RewardConfig::default()
            },
        );
        let before = snapshot(PoseVelocity2D::origin(), PoseVelocity2D::new(0.0, 0.0, 0.0), MatchState::Ongoing);
        let after = snapshot(PoseVelocity2D::origin(), PoseVelocity2D::new(0.5, 0.0, 0.0), MatchState::Ongoing);

        let shaped = model.reward(&after, Some(&before)) - model.reward(&after, None);
        assert_relative_eq!(shaped, 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_paused_is_not_scored() {
        let model = RewardModel::default();
        let ongoing = snapshot(PoseVelocity2D::origin(), PoseVelocity2D::origin(), MatchState::Ongoing);
        let paused = Snapshot {
            status: MatchState::Paused,
            ..ongoing
        };

        assert_eq!(model.reward(&ongoing, None), model.reward(&paused, None));
    }
}
