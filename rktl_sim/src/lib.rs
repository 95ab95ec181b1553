//! RKTL co-simulation protocol harness
//!
//! This crate drives a reinforcement-learning environment through scripted
//! fixtures while owning everything the environment can observe:
//!
//! - **Time**: a shared simulation clock, ticking or manually stepped
//! - **Sensors**: car, ball and match status republished on every tick
//! - **Resets**: a gate that acknowledges expected reset requests and
//!   reports unexpected ones the moment they arrive
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                        CoSimWorld                         │
//! │  ┌───────────┐  ticks   ┌────────────────────────┐        │
//! │  │   Clock   │─────────►│ ScriptedStatePublisher │        │
//! │  └─────┬─────┘          └───────────┬────────────┘        │
//! │        │                            │ car/ball/status     │
//! │        │                      ┌─────▼─────┐               │
//! │        └─────────────────────►│    Env    │ (under test)  │
//! │                               └─────┬─────┘               │
//! │                                     │ reset requests      │
//! │  ┌────────────────┐  violations ┌───▼──────┐              │
//! │  │ ProtocolDriver │◄────────────│ResetGate │              │
//! │  └────────────────┘             └──────────┘              │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use rktl_sim::{CoSimWorld, HarnessConfig, ScriptId};
//!
//! let world = CoSimWorld::start(HarnessConfig::default());
//! let mut driver = world.into_reference_driver();
//! let report = driver.run(ScriptId::Standard).await;
//! assert!(report.passed);
//! ```

mod config;
mod context;
mod driver;
mod error;
mod exporter;
pub mod fixtures;
mod oracle;
mod publisher;
pub mod reference_env;
mod reset_gate;
mod world;

pub use config::HarnessConfig;
pub use context::ManualClock;
pub use driver::{DriverConfig, FixtureReport, ProtocolDriver, ProtocolReport};
pub use error::{ConfigError, DriverError, FixtureFailure};
pub use exporter::{CommandRecorder, CommandSample, ProtocolExport};
pub use fixtures::{FixtureCall, FixtureScript, ScriptId, TestStepFixture};
pub use oracle::{almost_equal_places, AssertionOracle, Tolerance};
pub use publisher::{ScriptedStatePublisher, StagedState};
pub use reference_env::{EnvConfig, RocketLeagueEnv};
pub use reset_gate::{GateViolation, GateViolations, ResetGate};
pub use world::CoSimWorld;
