//! Manually stepped clock implementing ClockSource for deterministic tests.

use async_trait::async_trait;
use rktl_env::{ClockSource, ClockTick, TickEmitter};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, watch};

/// Simulation clock that only ticks when told to.
///
/// Every call to [`ManualClock::advance`] moves simulated time forward and
/// emits exactly one tick, so a test decides precisely how many ticks an
/// environment gets to see.
pub struct ManualClock {
    /// Current virtual time (nanoseconds since simulation start)
    virtual_time_ns: Arc<Mutex<u64>>,

    emitter: Arc<TickEmitter>,
}

impl ManualClock {
    /// Creates a clock at time zero that has not ticked yet.
    pub fn new() -> Self {
        Self {
            virtual_time_ns: Arc::new(Mutex::new(0)),
            emitter: Arc::new(TickEmitter::default()),
        }
    }

    /// Creates an Arc-wrapped clock for sharing.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Advances virtual time by `duration` and emits a tick.
    pub fn advance(&self, duration: Duration) -> ClockTick {
        let time_ns = {
            let mut time = self.virtual_time_ns.lock().unwrap_or_else(|e| e.into_inner());
            *time += duration.as_nanos() as u64;
            *time
        };
        self.emitter.emit(Duration::from_nanos(time_ns))
    }

    /// Returns the current virtual time in nanoseconds.
    pub fn time_ns(&self) -> u64 {
        *self.virtual_time_ns.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ManualClock {
    fn clone(&self) -> Self {
        Self {
            virtual_time_ns: Arc::clone(&self.virtual_time_ns),
            emitter: Arc::clone(&self.emitter),
        }
    }
}

#[async_trait]
impl ClockSource for ManualClock {
    fn watch(&self) -> watch::Receiver<Option<ClockTick>> {
        self.emitter.watch()
    }

    fn subscribe(&self) -> broadcast::Receiver<ClockTick> {
        self.emitter.subscribe()
    }
}
