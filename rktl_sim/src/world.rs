//! CoSimWorld - wires the clock, bus, publisher and reset gate together.

use crate::config::HarnessConfig;
use crate::driver::ProtocolDriver;
use crate::publisher::ScriptedStatePublisher;
use crate::reference_env::RocketLeagueEnv;
use crate::reset_gate::{GateViolations, ResetGate};

use rktl_env::{
    reset_endpoint, ClockSource, DiagnosticStatus, Environment, ResetClient, SensorBus, TickingClock,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

/// The harness side of a co-simulation run.
///
/// Owns the clock, the sensor bus, the state publisher (already following
/// the clock) and the reset gate (already serving the endpoint). An
/// environment-under-test is built against [`CoSimWorld::bus`] and
/// [`CoSimWorld::reset_client`], then handed to [`CoSimWorld::into_driver`].
pub struct CoSimWorld<C: ClockSource> {
    /// Configuration
    pub config: HarnessConfig,

    /// Shared simulation clock
    pub clock: Arc<C>,

    /// Sensor and command channels
    pub bus: SensorBus,

    /// Staged state republished on every tick
    pub publisher: ScriptedStatePublisher,

    /// Server side of the reset endpoint
    pub gate: ResetGate,

    violations: GateViolations,
    reset_client: ResetClient,
}

impl CoSimWorld<TickingClock> {
    /// Starts a ticking clock from the configuration and builds the world around it.
    pub fn start(config: HarnessConfig) -> Self {
        let clock = TickingClock::start(config.tick_period(), config.real_time_factor);
        info!(
            tick_period = ?config.tick_period(),
            real_time_factor = config.real_time_factor,
            "Co-simulation clock started"
        );
        Self::with_clock(config, clock)
    }
}

impl<C: ClockSource> CoSimWorld<C> {
    /// Builds the world around an existing clock.
    pub fn with_clock(config: HarnessConfig, clock: Arc<C>) -> Self {
        let bus = SensorBus::new(config.bus_capacity);
        let publisher = ScriptedStatePublisher::new();
        let (gate, violations) = ResetGate::new();
        let (reset_client, requests) = reset_endpoint(4);

        // Both tasks end on their own once the clock and every reset
        // client are dropped
        publisher.spawn(clock.as_ref(), bus.clone());
        gate.spawn(Arc::clone(&clock), requests);

        Self {
            config,
            clock,
            bus,
            publisher,
            gate,
            violations,
            reset_client,
        }
    }

    /// Client for the reset endpoint this world serves.
    pub fn reset_client(&self) -> ResetClient {
        self.reset_client.clone()
    }

    pub fn tick_period(&self) -> Duration {
        self.config.tick_period()
    }

    /// Builds the reference environment against this world.
    pub fn reference_env(&self) -> RocketLeagueEnv<C> {
        RocketLeagueEnv::new(
            self.config.env.clone(),
            Arc::clone(&self.clock),
            &self.bus,
            self.reset_client(),
        )
    }

    /// Builds the reference environment with episode diagnostics on `tx`.
    pub fn reference_env_with_diagnostics(
        &self,
        tx: mpsc::UnboundedSender<DiagnosticStatus>,
    ) -> RocketLeagueEnv<C> {
        self.reference_env().with_diagnostics(tx)
    }

    /// Hands the world to a driver for `env`.
    ///
    /// Background tasks keep running for as long as the clock and the
    /// environment's reset client are alive.
    pub fn into_driver<E: Environment>(self, env: E) -> ProtocolDriver<E, C> {
        let driver_config = self.config.driver_config();
        ProtocolDriver::new(
            env,
            self.clock,
            self.publisher,
            self.gate,
            self.violations,
            driver_config,
        )
    }

    /// Reference environment and driver in one go.
    pub fn into_reference_driver(self) -> ProtocolDriver<RocketLeagueEnv<C>, C> {
        let env = self.reference_env();
        self.into_driver(env)
    }
}
