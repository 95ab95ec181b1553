//! Scripted fixtures and the built-in fixture scripts.

use crate::error::ConfigError;
use crate::publisher::StagedState;
use rktl_env::{MatchState, PoseVelocity2D};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Budget for the first call of a script, which also covers environment startup.
pub const FIRST_CALL_BUDGET: Duration = Duration::from_millis(600);

/// Budget for every later call.
pub const STEP_BUDGET: Duration = Duration::from_millis(200);

/// Which environment entry point a fixture exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixtureCall {
    Reset,
    Step,
}

/// One scripted interaction with the environment-under-test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestStepFixture {
    #[serde(default)]
    pub label: String,

    pub call: FixtureCall,

    pub car: PoseVelocity2D,

    pub ball: PoseVelocity2D,

    pub status: MatchState,

    /// Whether the reset gate must be called exactly once during this call
    pub expect_reset: bool,

    /// Simulated-time budget for the call
    #[serde(rename = "max_elapsed_secs", with = "duration_secs")]
    pub max_elapsed: Duration,

    pub expected_observation: Vec<f64>,

    #[serde(default)]
    pub expected_reward: Option<f64>,

    #[serde(default)]
    pub expected_done: Option<bool>,
}

impl TestStepFixture {
    /// A `reset()` fixture; expects exactly one reset request.
    pub fn reset(
        label: &str,
        car: PoseVelocity2D,
        ball: PoseVelocity2D,
        status: MatchState,
    ) -> Self {
        Self {
            label: label.to_string(),
            call: FixtureCall::Reset,
            car,
            ball,
            status,
            expect_reset: true,
            max_elapsed: STEP_BUDGET,
            expected_observation: Vec::new(),
            expected_reward: None,
            expected_done: None,
        }
    }

    /// A `step()` fixture; expects no reset request.
    pub fn step(
        label: &str,
        car: PoseVelocity2D,
        ball: PoseVelocity2D,
        status: MatchState,
    ) -> Self {
        Self {
            call: FixtureCall::Step,
            expect_reset: false,
            ..Self::reset(label, car, ball, status)
        }
    }

    pub fn expect_observation(mut self, observation: impl Into<Vec<f64>>) -> Self {
        self.expected_observation = observation.into();
        self
    }

    pub fn expect_reward(mut self, reward: f64) -> Self {
        self.expected_reward = Some(reward);
        self
    }

    pub fn expect_done(mut self, done: bool) -> Self {
        self.expected_done = Some(done);
        self
    }

    pub fn within(mut self, budget: Duration) -> Self {
        self.max_elapsed = budget;
        self
    }

    /// The values the publisher republishes while this fixture is live.
    pub fn staged_state(&self) -> StagedState {
        StagedState::new(self.car, self.ball, self.status)
    }

    /// Checks that the fixture is internally consistent.
    pub fn validate(&self) -> Result<(), String> {
        if self.expected_observation.is_empty() {
            return Err("no expected observation".to_string());
        }
        if self.max_elapsed.is_zero() {
            return Err("zero time budget".to_string());
        }
        if self.call == FixtureCall::Reset
            && (self.expected_reward.is_some() || self.expected_done.is_some())
        {
            return Err("reset fixtures cannot expect a reward or done flag".to_string());
        }
        let states = [self.car, self.ball];
        if states.iter().any(|s| {
            !(s.x.is_finite() && s.y.is_finite() && s.heading.is_finite() && s.linear_speed.is_finite())
        }) {
            return Err("non-finite staged state".to_string());
        }
        Ok(())
    }
}

/// A named, ordered list of fixtures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureScript {
    pub name: String,

    #[serde(default)]
    pub description: String,

    pub fixtures: Vec<TestStepFixture>,
}

impl FixtureScript {
    /// Load a script from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse a script from a YAML string and validate every fixture.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let script: FixtureScript = serde_yaml::from_str(yaml)?;
        script.validate()?;
        Ok(script)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fixtures.is_empty() {
            return Err(ConfigError::Invalid(format!("script '{}' has no fixtures", self.name)));
        }
        for (index, fixture) in self.fixtures.iter().enumerate() {
            fixture.validate().map_err(|reason| {
                ConfigError::Invalid(format!("fixture {} ({}): {}", index, fixture.label, reason))
            })?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.fixtures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixtures.is_empty()
    }
}

/// Built-in script identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptId {
    /// Reset, ongoing step, team A win, reset, team B win
    Standard,

    /// Standard script run twice; rewards must match bit for bit
    Determinism,

    /// One long ongoing episode; done must stay false
    Ongoing,
}

impl ScriptId {
    /// Returns a list of all scripts.
    pub fn all() -> Vec<ScriptId> {
        vec![ScriptId::Standard, ScriptId::Determinism, ScriptId::Ongoing]
    }

    /// Returns the script name.
    pub fn name(&self) -> &'static str {
        match self {
            ScriptId::Standard => "standard",
            ScriptId::Determinism => "determinism",
            ScriptId::Ongoing => "ongoing",
        }
    }

    /// Returns a description of the script.
    pub fn description(&self) -> &'static str {
        match self {
            ScriptId::Standard => "Reset, ongoing step, team A victory, reset, team B victory",
            ScriptId::Determinism => "Standard script twice from fresh resets, rewards compared bit for bit",
            ScriptId::Ongoing => "Car drives toward a moving ball for several steps without a decision",
        }
    }

    /// Number of times the script is run back to back.
    pub fn passes(&self) -> usize {
        match self {
            ScriptId::Determinism => 2,
            _ => 1,
        }
    }

    /// Builds the fixtures for this script.
    pub fn script(&self) -> FixtureScript {
        let fixtures = match self {
            ScriptId::Standard | ScriptId::Determinism => standard_fixtures(),
            ScriptId::Ongoing => ongoing_fixtures(),
        };
        FixtureScript {
            name: self.name().to_string(),
            description: self.description().to_string(),
            fixtures,
        }
    }
}

impl std::fmt::Display for ScriptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScriptId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "standard" => Ok(ScriptId::Standard),
            "determinism" | "deterministic" => Ok(ScriptId::Determinism),
            "ongoing" => Ok(ScriptId::Ongoing),
            _ => Err(format!("Unknown script: {}", s)),
        }
    }
}

fn state(x: f64, y: f64, v: f64) -> PoseVelocity2D {
    PoseVelocity2D::new(x, y, v)
}

fn standard_fixtures() -> Vec<TestStepFixture> {
    let at_rest = [0.0; 9];

    vec![
        TestStepFixture::reset("kickoff", state(0.0, 0.0, 0.0), state(0.0, 0.0, 0.0), MatchState::Ongoing)
            .expect_observation(at_rest)
            .within(FIRST_CALL_BUDGET),
        TestStepFixture::step("drive", state(0.0, 0.0, 1.0), state(0.0, 0.0, 0.0), MatchState::Ongoing)
            .expect_observation([0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0])
            .expect_reward(-2.125)
            .expect_done(false),
        TestStepFixture::step("team_a_wins", state(0.0, 0.0, -1.0), state(1.0, 0.0, 0.0), MatchState::VictoryTeamA)
            .expect_observation([0.0, 0.0, 0.0, -1.0, 0.0, 1.0, 0.0, 0.0, 0.0])
            .expect_reward(998.775)
            .expect_done(true),
        TestStepFixture::reset("rematch", state(0.0, 0.0, 0.0), state(0.0, 0.0, 0.0), MatchState::Ongoing)
            .expect_observation(at_rest),
        TestStepFixture::step("team_b_wins", state(1.0, 0.5, 0.0), state(-2.3, 1.0, 0.0), MatchState::VictoryTeamB)
            .expect_observation([1.0, 0.5, 0.0, 0.0, 0.0, -2.3, 1.0, 0.0, 0.0])
            .expect_reward(-512.1339)
            .expect_done(true),
    ]
}

fn ongoing_fixtures() -> Vec<TestStepFixture> {
    let ball = state(2.0, 0.0, 0.5);
    let mut fixtures = vec![
        TestStepFixture::reset("kickoff", state(0.0, 0.0, 0.0), ball, MatchState::Ongoing)
            .expect_observation([0.0, 0.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.5, 0.0])
            .within(FIRST_CALL_BUDGET),
    ];

    // reward = -0.5 - 0.04 * |car - ball| - 0.26 * (2.5 - 2.0)^2
    for (i, (x, reward)) in [(0.5, -0.625), (1.0, -0.605), (1.5, -0.585)].into_iter().enumerate() {
        fixtures.push(
            TestStepFixture::step(&format!("approach_{}", i), state(x, 0.0, 1.0), ball, MatchState::Ongoing)
                .expect_observation([x, 0.0, 0.0, 1.0, 0.0, 2.0, 0.0, 0.5, 0.0])
                .expect_reward(reward)
                .expect_done(false),
        );
    }

    // Paused matches do not end the episode either
    fixtures.push(
        TestStepFixture::step("paused", state(1.5, 0.0, 0.0), ball, MatchState::Paused)
            .expect_observation([1.5, 0.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.5, 0.0])
            .expect_reward(-0.585)
            .expect_done(false),
    );

    fixtures
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_scripts_validate() {
        for id in ScriptId::all() {
            let script = id.script();
            script.validate().unwrap();
            assert_eq!(script.name, id.name());
        }
    }

    #[test]
    fn test_standard_script_shape() {
        let script = ScriptId::Standard.script();
        assert_eq!(script.len(), 5);

        let first = &script.fixtures[0];
        assert_eq!(first.call, FixtureCall::Reset);
        assert!(first.expect_reset);
        assert_eq!(first.max_elapsed, FIRST_CALL_BUDGET);

        for fixture in &script.fixtures[1..] {
            assert_eq!(fixture.max_elapsed, STEP_BUDGET);
            assert_eq!(fixture.expect_reset, fixture.call == FixtureCall::Reset);
        }
    }

    #[test]
    fn test_done_expected_only_for_victories() {
        for id in ScriptId::all() {
            for fixture in id.script().fixtures {
                if let Some(done) = fixture.expected_done {
                    assert_eq!(done, fixture.status.is_terminal(), "{}", fixture.label);
                }
            }
        }
    }

    #[test]
    fn test_script_id_parse() {
        assert_eq!("standard".parse::<ScriptId>(), Ok(ScriptId::Standard));
        assert_eq!("Determinism".parse::<ScriptId>(), Ok(ScriptId::Determinism));
        assert!("chaos".parse::<ScriptId>().is_err());
    }

    #[test]
    fn test_validate_rejects_reward_on_reset() {
        let fixture = TestStepFixture::reset("bad", PoseVelocity2D::origin(), PoseVelocity2D::origin(), MatchState::Ongoing)
            .expect_observation([0.0; 9])
            .expect_reward(1.0);

        assert!(fixture.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_missing_observation() {
        let fixture = TestStepFixture::step("bad", PoseVelocity2D::origin(), PoseVelocity2D::origin(), MatchState::Ongoing);
        assert!(fixture.validate().is_err());
    }

    #[test]
    fn test_script_from_yaml() {
        let yaml = r#"
name: single_step
fixtures:
  - label: kickoff
    call: reset
    car: { x: 0.0, y: 0.0 }
    ball: { x: 0.0, y: 0.0 }
    status: ONGOING
    expect_reset: true
    max_elapsed_secs: 0.6
    expected_observation: [0, 0, 0, 0, 0, 0, 0, 0, 0]
  - label: drive
    call: step
    car: { x: 0.0, y: 0.0, linear_speed: 1.0 }
    ball: { x: 0.0, y: 0.0 }
    status: ONGOING
    expect_reset: false
    max_elapsed_secs: 0.2
    expected_observation: [0, 0, 0, 1, 0, 0, 0, 0, 0]
    expected_reward: -2.125
    expected_done: false
"#;
        let script = FixtureScript::from_yaml(yaml).unwrap();

        assert_eq!(script.len(), 2);
        assert_eq!(script.fixtures[0].max_elapsed, Duration::from_millis(600));
        assert_eq!(script.fixtures[1].car.linear_speed, 1.0);
        assert_eq!(script.fixtures[1].expected_reward, Some(-2.125));
    }

    #[test]
    fn test_script_from_yaml_rejects_invalid_fixture() {
        let yaml = r#"
name: broken
fixtures:
  - call: step
    car: { x: 0.0, y: 0.0 }
    ball: { x: 0.0, y: 0.0 }
    status: ONGOING
    expect_reset: false
    max_elapsed_secs: 0.2
    expected_observation: []
"#;
        assert!(matches!(FixtureScript::from_yaml(yaml), Err(ConfigError::Invalid(_))));
    }
}
