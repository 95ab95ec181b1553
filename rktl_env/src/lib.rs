//! RKTL Environment Abstraction Layer
//!
//! This crate provides the seams that let a reinforcement-learning
//! environment run against either the live simulator or a scripted
//! co-simulation harness:
//!
//! - Simulated time (`ClockSource`: `now()`, `sleep()`, tick subscription)
//! - Sensor topics (`SensorBus`: car, ball, match status, control commands)
//! - The reset-request endpoint (`ResetClient` / `ResetRequests`)
//! - The environment contract itself (`Environment`, `ActionSpace`)
//!
//! All timing is measured in simulated time carried by clock ticks, never
//! the wall clock.
//!
//! # Example
//!
//! ```ignore
//! use rktl_env::{ClockSource, Environment};
//!
//! async fn episode<E: Environment, C: ClockSource>(env: &mut E, clock: &C) {
//!     let t0 = clock.now();
//!     let obs = env.reset().await?;
//!     println!("reset took {:?} of sim time", clock.now() - t0);
//! }
//! ```

mod bus;
mod context;
mod diagnostics;
mod env;
mod error;
mod tokio_impl;
mod types;

pub use bus::{reset_endpoint, ResetClient, ResetRequest, ResetRequests, SensorBus, SensorSubscription};
pub use context::{wait_until, ClockSource, ClockTick, TickEmitter};
pub use diagnostics::{DiagnosticStatus, KeyValue};
pub use env::{ActionSpace, Discrete, Environment, Observation, StepOutcome};
pub use error::EnvError;
pub use tokio_impl::TickingClock;
pub use types::{ControlCommand, MatchState, PoseVelocity2D, RunId, Stamped};
