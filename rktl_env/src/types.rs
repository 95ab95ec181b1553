//! Common types for the RKTL environment abstraction.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Identifier for a test run, derived from the run seed so reruns share it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Creates a deterministic RunId from a seed (for reproducible runs).
    pub fn from_seed(seed: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[0..8].copy_from_slice(&seed.to_le_bytes());
        bytes[8..16].copy_from_slice(&seed.wrapping_mul(0x517cc1b727220a95).to_le_bytes());
        Self(Uuid::from_bytes(bytes))
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Show first 8 chars for readability
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Minimal planar kinematic state of a car or the ball.
///
/// Replaced wholesale between ticks, never mutated in place.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseVelocity2D {
    /// Position along the field length (m)
    pub x: f64,

    /// Position along the field width (m)
    pub y: f64,

    /// Heading in radians (0 = facing +x)
    #[serde(default)]
    pub heading: f64,

    /// Signed speed along the heading (m/s); negative means reversing
    #[serde(default)]
    pub linear_speed: f64,
}

impl PoseVelocity2D {
    /// Creates a state facing +x.
    pub fn new(x: f64, y: f64, linear_speed: f64) -> Self {
        Self {
            x,
            y,
            heading: 0.0,
            linear_speed,
        }
    }

    /// Returns a copy with the given heading.
    pub fn with_heading(mut self, heading: f64) -> Self {
        self.heading = heading;
        self
    }

    /// A state at the origin, at rest.
    pub fn origin() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn position(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }

    /// Velocity vector in the field frame.
    pub fn velocity(&self) -> Vector2<f64> {
        Vector2::new(
            self.linear_speed * self.heading.cos(),
            self.linear_speed * self.heading.sin(),
        )
    }
}

/// Match status as reported by the field referee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchState {
    Paused,
    Ongoing,
    VictoryTeamA,
    VictoryTeamB,
}

impl MatchState {
    /// True if the match has been decided and the episode must end.
    pub fn is_terminal(&self) -> bool {
        matches!(self, MatchState::VictoryTeamA | MatchState::VictoryTeamB)
    }

    pub fn name(&self) -> &'static str {
        match self {
            MatchState::Paused => "PAUSED",
            MatchState::Ongoing => "ONGOING",
            MatchState::VictoryTeamA => "VICTORY_TEAM_A",
            MatchState::VictoryTeamB => "VICTORY_TEAM_B",
        }
    }
}

impl std::fmt::Display for MatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for MatchState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PAUSED" => Ok(MatchState::Paused),
            "ONGOING" => Ok(MatchState::Ongoing),
            "VICTORY_TEAM_A" | "A" => Ok(MatchState::VictoryTeamA),
            "VICTORY_TEAM_B" | "B" => Ok(MatchState::VictoryTeamB),
            _ => Err(format!("Unknown match state: {}", s)),
        }
    }
}

/// A channel message stamped with the simulated time it was published at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stamped<T> {
    /// Simulated time of the tick that produced this message
    pub stamp: Duration,

    pub value: T,
}

impl<T> Stamped<T> {
    pub fn new(stamp: Duration, value: T) -> Self {
        Self { stamp, value }
    }
}

/// Drive command published by an environment for the car under control.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlCommand {
    /// Normalized throttle in [-1, 1]
    pub throttle: f64,

    /// Path curvature (1/m)
    pub curvature: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_from_seed_is_deterministic() {
        assert_eq!(RunId::from_seed(7), RunId::from_seed(7));
        assert_ne!(RunId::from_seed(7), RunId::from_seed(8));
        assert_eq!(RunId::from_seed(7).to_string().len(), 8);
    }

    #[test]
    fn test_velocity_follows_heading() {
        let state = PoseVelocity2D::new(0.0, 0.0, 2.0).with_heading(std::f64::consts::FRAC_PI_2);
        let v = state.velocity();

        assert!(v.x.abs() < 1e-12);
        assert!((v.y - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_only_victories_are_terminal() {
        assert!(!MatchState::Paused.is_terminal());
        assert!(!MatchState::Ongoing.is_terminal());
        assert!(MatchState::VictoryTeamA.is_terminal());
        assert!(MatchState::VictoryTeamB.is_terminal());
    }

    #[test]
    fn test_match_state_parse_roundtrip() {
        for state in [
            MatchState::Paused,
            MatchState::Ongoing,
            MatchState::VictoryTeamA,
            MatchState::VictoryTeamB,
        ] {
            assert_eq!(state.name().parse::<MatchState>(), Ok(state));
        }
        assert!("draw".parse::<MatchState>().is_err());
    }
}
