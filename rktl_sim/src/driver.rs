//! Protocol driver - runs fixture scripts against an environment-under-test.

use crate::error::{DriverError, FixtureFailure};
use crate::fixtures::{FixtureCall, FixtureScript, ScriptId, TestStepFixture};
use crate::oracle::AssertionOracle;
use crate::publisher::ScriptedStatePublisher;
use crate::reset_gate::{GateViolation, GateViolations, ResetGate};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rktl_env::{
    ActionSpace, ClockSource, ClockTick, Environment, Observation, RunId, StepOutcome,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Driver settings.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverConfig {
    /// Seed for action sampling
    pub seed: u64,

    /// How long to wait for the clock's first tick
    pub first_tick_timeout: Duration,

    /// Wall-clock limit per environment call (None = unlimited)
    pub call_timeout: Option<Duration>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            first_tick_timeout: Duration::from_secs(5),
            call_timeout: None,
        }
    }
}

/// Record of one fixture that passed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureReport {
    pub index: usize,
    pub label: String,
    pub call: FixtureCall,

    /// Simulated time the call was issued at
    pub started_secs: f64,

    /// Simulated time the call took
    pub elapsed_secs: f64,

    pub budget_secs: f64,
    pub reset_calls: u32,
    pub observation: Vec<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub done: Option<bool>,
}

/// Results from running a script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolReport {
    /// Script that was run
    pub script: String,

    /// Seed used
    pub seed: u64,

    /// Derived from the seed, so reruns share it
    pub run_id: RunId,

    /// Whether every fixture passed
    pub passed: bool,

    /// Times the script was run back to back
    pub passes: usize,

    /// Fixtures completed successfully, across all passes
    pub fixtures_run: usize,

    /// Fixtures in one pass
    pub total_fixtures: usize,

    /// Final simulation time in seconds
    pub final_time_secs: f64,

    /// Failure message if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,

    pub fixtures: Vec<FixtureReport>,
}

impl ProtocolReport {
    fn new(script: &FixtureScript, seed: u64, passes: usize) -> Self {
        Self {
            script: script.name.clone(),
            seed,
            run_id: RunId::from_seed(seed),
            passed: false,
            passes,
            fixtures_run: 0,
            total_fixtures: script.len(),
            final_time_secs: 0.0,
            failure_reason: None,
            fixtures: Vec::new(),
        }
    }

    /// Rewards of the given pass, in fixture order.
    pub fn rewards(&self, pass: usize) -> Vec<Option<f64>> {
        self.fixtures
            .iter()
            .skip(pass * self.total_fixtures)
            .take(self.total_fixtures)
            .map(|f| f.reward)
            .collect()
    }
}

struct CallOutcome {
    observation: Observation,
    reward: Option<f64>,
    done: Option<bool>,
}

impl CallOutcome {
    fn from_reset(observation: Observation) -> Self {
        Self {
            observation,
            reward: None,
            done: None,
        }
    }

    fn from_step(outcome: StepOutcome) -> Self {
        Self {
            observation: outcome.observation,
            reward: Some(outcome.reward),
            done: Some(outcome.done),
        }
    }
}

enum Invocation<A> {
    Reset,
    Step(A),
}

impl From<GateViolation> for FixtureFailure {
    fn from(violation: GateViolation) -> Self {
        FixtureFailure::UnexpectedReset {
            call_index: violation.call_index,
            sim_time: violation.sim_time,
        }
    }
}

/// Drives an environment through scripted fixtures.
///
/// For each fixture the driver records the current simulated time, stages
/// the fixture's state on the publisher, arms the reset gate, then calls
/// the environment. The call is raced against the gate's violation channel
/// so an unexpected reset aborts the fixture at once, even if the
/// environment never returns. The first failure ends the run.
pub struct ProtocolDriver<E: Environment, C: ClockSource> {
    env: E,
    clock: Arc<C>,
    publisher: ScriptedStatePublisher,
    gate: ResetGate,
    violations: GateViolations,
    oracle: AssertionOracle,
    rng: ChaCha8Rng,
    config: DriverConfig,
    clock_started: bool,

    /// Reset requests counted inside fixture windows so far
    accounted_calls: u64,
}

impl<E: Environment, C: ClockSource> ProtocolDriver<E, C> {
    pub fn new(
        env: E,
        clock: Arc<C>,
        publisher: ScriptedStatePublisher,
        gate: ResetGate,
        violations: GateViolations,
        config: DriverConfig,
    ) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            env,
            clock,
            publisher,
            gate,
            violations,
            oracle: AssertionOracle::default(),
            config,
            clock_started: false,
            accounted_calls: 0,
        }
    }

    pub fn with_oracle(mut self, oracle: AssertionOracle) -> Self {
        self.oracle = oracle;
        self
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn gate(&self) -> &ResetGate {
        &self.gate
    }

    pub fn clock(&self) -> &Arc<C> {
        &self.clock
    }

    /// Waits for the first clock tick, bounded by `first_tick_timeout`.
    pub async fn wait_for_clock(&mut self) -> Result<ClockTick, DriverError> {
        let limit = self.config.first_tick_timeout;
        let tick = tokio::time::timeout(limit, self.clock.first_tick())
            .await
            .map_err(|_| DriverError::ClockNeverStarted(limit))??;

        if !self.clock_started {
            self.clock_started = true;
            info!(sim_time = ?tick.sim_time, "Clock running");
        }
        Ok(tick)
    }

    /// Runs one fixture and checks every expectation it carries.
    pub async fn run_fixture(
        &mut self,
        index: usize,
        fixture: &TestStepFixture,
    ) -> Result<FixtureReport, DriverError> {
        fixture
            .validate()
            .map_err(|reason| DriverError::InvalidFixture { index, reason })?;
        self.wait_for_clock().await?;

        self.check_gate_quiet()?;

        let started = self.clock.now();
        self.publisher.stage(fixture.staged_state());
        let window = self.gate.arm(fixture.expect_reset);
        debug!(index, label = %fixture.label, window, ?started, call = ?fixture.call, "Fixture armed");

        let fail = |failure| DriverError::fixture(index, &fixture.label, failure);

        let outcome = self.invoke(fixture.call).await;
        let returned = self.clock.now();
        let reset_calls = self.gate.window_calls();
        self.accounted_calls += u64::from(reset_calls);
        let outcome = outcome.map_err(fail)?;

        self.check(fixture, &outcome, started, returned, reset_calls)
            .map_err(fail)?;

        Ok(FixtureReport {
            index,
            label: fixture.label.clone(),
            call: fixture.call,
            started_secs: started.as_secs_f64(),
            elapsed_secs: returned.saturating_sub(started).as_secs_f64(),
            budget_secs: fixture.max_elapsed.as_secs_f64(),
            reset_calls,
            observation: outcome.observation.0,
            reward: outcome.reward,
            done: outcome.done,
        })
    }

    /// Fails if the gate saw a request after the previous window was checked.
    ///
    /// Such a request was either rejected, leaving a violation behind, or
    /// acknowledged without being counted against any fixture.
    pub fn check_gate_quiet(&mut self) -> Result<(), DriverError> {
        if let Ok(violation) = self.violations.try_recv() {
            return Err(DriverError::LateReset {
                window: violation.window,
                call_index: violation.call_index,
                sim_time: violation.sim_time,
            });
        }
        let actual = self.gate.total_calls();
        if actual != self.accounted_calls {
            return Err(DriverError::UnaccountedResets {
                expected: self.accounted_calls,
                actual,
            });
        }
        Ok(())
    }

    /// Runs a script once.
    pub async fn run_script(&mut self, script: &FixtureScript) -> ProtocolReport {
        self.run_passes(script, 1).await
    }

    /// Runs a built-in script.
    pub async fn run(&mut self, id: ScriptId) -> ProtocolReport {
        let mut report = self.run_passes(&id.script(), id.passes()).await;
        report.script = id.name().to_string();
        report
    }

    /// Runs `script` `passes` times back to back.
    ///
    /// From the second pass on, each reward must equal the first pass's
    /// reward at the same fixture bit for bit.
    pub async fn run_passes(&mut self, script: &FixtureScript, passes: usize) -> ProtocolReport {
        let passes = passes.max(1);
        info!("Starting script: {} (seed={}, passes={})", script.name, self.config.seed, passes);

        let mut report = ProtocolReport::new(script, self.config.seed, passes);
        let mut baseline: Vec<Option<f64>> = Vec::with_capacity(script.len());

        for pass in 0..passes {
            for (index, fixture) in script.fixtures.iter().enumerate() {
                let result = self.run_fixture(index, fixture).await.and_then(|fixture_report| {
                    if pass == 0 {
                        baseline.push(fixture_report.reward);
                    } else {
                        check_repeatable(index, baseline[index], fixture_report.reward)?;
                    }
                    Ok(fixture_report)
                });

                match result {
                    Ok(fixture_report) => {
                        info!(
                            "  ✓ [{}] {} ({:.3}s of {:.3}s)",
                            index, fixture_report.label, fixture_report.elapsed_secs, fixture_report.budget_secs
                        );
                        report.fixtures_run += 1;
                        report.fixtures.push(fixture_report);
                    }
                    Err(err) => {
                        error!("  ✗ [{}] {}", index, err);
                        report.failure_reason = Some(err.to_string());
                        report.final_time_secs = self.clock.now().as_secs_f64();
                        return report;
                    }
                }
            }
        }

        report.final_time_secs = self.clock.now().as_secs_f64();
        if let Err(err) = self.check_gate_quiet() {
            error!("  ✗ {}", err);
            report.failure_reason = Some(err.to_string());
            return report;
        }
        report.passed = true;
        report
    }

    async fn invoke(&mut self, call: FixtureCall) -> Result<CallOutcome, FixtureFailure> {
        let invocation = match call {
            FixtureCall::Reset => Invocation::Reset,
            FixtureCall::Step => Invocation::Step(self.env.action_space().sample(&mut self.rng)),
        };
        if let Invocation::Step(action) = &invocation {
            debug!(?action, "Sampled action");
        }

        let call_timeout = self.config.call_timeout;
        let env = &mut self.env;
        let violations = &mut self.violations;

        let guarded = async move {
            let call = async move {
                match invocation {
                    Invocation::Reset => env.reset().await.map(CallOutcome::from_reset),
                    Invocation::Step(action) => env.step(action).await.map(CallOutcome::from_step),
                }
            };

            tokio::select! {
                biased;
                Some(violation) = violations.recv() => Err(FixtureFailure::from(violation)),
                result = call => result.map_err(FixtureFailure::from),
            }
        };

        let result = match call_timeout {
            Some(limit) => tokio::time::timeout(limit, guarded)
                .await
                .unwrap_or(Err(FixtureFailure::CallTimedOut(limit))),
            None => guarded.await,
        };

        // An environment may swallow the rejection and return normally
        if let Ok(violation) = self.violations.try_recv() {
            return Err(violation.into());
        }
        result
    }

    fn check(
        &self,
        fixture: &TestStepFixture,
        outcome: &CallOutcome,
        started: Duration,
        returned: Duration,
        reset_calls: u32,
    ) -> Result<(), FixtureFailure> {
        let oracle = &self.oracle;

        oracle.check_observation(&fixture.expected_observation, &outcome.observation)?;
        if let (Some(expected), Some(actual)) = (fixture.expected_reward, outcome.reward) {
            oracle.check_reward(expected, actual)?;
        }
        if let (Some(expected), Some(actual)) = (fixture.expected_done, outcome.done) {
            oracle.check_done(expected, actual)?;
        }
        oracle.check_elapsed(started, returned, fixture.max_elapsed)?;
        oracle.check_reset_calls(fixture.expect_reset, reset_calls)
    }
}

fn check_repeatable(index: usize, first: Option<f64>, second: Option<f64>) -> Result<(), DriverError> {
    if first.map(f64::to_bits) == second.map(f64::to_bits) {
        Ok(())
    } else {
        Err(DriverError::NonDeterministic {
            index,
            first: first.unwrap_or(f64::NAN),
            second: second.unwrap_or(f64::NAN),
        })
    }
}
