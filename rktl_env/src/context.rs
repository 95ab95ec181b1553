//! Simulated clock abstraction shared by the harness and environments.

use crate::error::EnvError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{broadcast, watch};

/// One tick of the simulated clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockTick {
    /// Tick sequence number, starting at 0
    pub seq: u64,

    /// Simulated time carried by this tick
    pub sim_time: Duration,
}

/// The single authority for simulated time.
///
/// Everything that measures elapsed time in the harness goes through this
/// trait, never through the wall clock, so results stay the same under
/// accelerated or paused simulation.
///
/// # Implementations
///
/// - **Production**: `TickingClock` - tokio interval, scaled by a real-time factor
/// - **Simulation**: `ManualClock` (in `rktl_sim`) - ticks only when advanced
#[async_trait]
pub trait ClockSource: Send + Sync + 'static {
    /// Receiver that always holds the most recent tick (`None` before the first).
    fn watch(&self) -> watch::Receiver<Option<ClockTick>>;

    /// Receiver that observes every tick in order.
    fn subscribe(&self) -> broadcast::Receiver<ClockTick>;

    /// The most recent tick, if the clock has started.
    fn latest(&self) -> Option<ClockTick> {
        *self.watch().borrow()
    }

    /// Simulated time of the most recent tick (zero before the first tick).
    fn now(&self) -> Duration {
        self.latest().map(|tick| tick.sim_time).unwrap_or(Duration::ZERO)
    }

    /// Waits until simulated time has advanced by at least `duration`.
    async fn sleep(&self, duration: Duration) -> Result<(), EnvError> {
        let target = self.now() + duration;
        wait_until(self.watch(), target).await
    }

    /// Waits for the first tick of the clock.
    async fn first_tick(&self) -> Result<ClockTick, EnvError> {
        let mut rx = self.watch();
        let tick = *rx
            .wait_for(|tick| tick.is_some())
            .await
            .map_err(|_| EnvError::ClockStopped)?;
        tick.ok_or(EnvError::ClockStopped)
    }
}

/// Waits until the watched clock reaches `target`.
pub async fn wait_until(
    mut rx: watch::Receiver<Option<ClockTick>>,
    target: Duration,
) -> Result<(), EnvError> {
    rx.wait_for(|tick| tick.map_or(false, |t| t.sim_time >= target))
        .await
        .map(|_| ())
        .map_err(|_| EnvError::ClockStopped)
}

/// Fan-out of clock ticks to watchers and subscribers.
///
/// Clock implementations own one of these and call [`TickEmitter::emit`]
/// for every tick. Simulated time never goes backwards: an earlier time is
/// clamped to the previous tick.
pub struct TickEmitter {
    next_seq: AtomicU64,
    latest_tx: watch::Sender<Option<ClockTick>>,
    tick_tx: broadcast::Sender<ClockTick>,
}

impl TickEmitter {
    /// Creates an emitter whose subscribers may lag by up to `capacity` ticks.
    pub fn new(capacity: usize) -> Self {
        let (latest_tx, _) = watch::channel(None);
        let (tick_tx, _) = broadcast::channel(capacity.max(1));
        Self {
            next_seq: AtomicU64::new(0),
            latest_tx,
            tick_tx,
        }
    }

    /// Publishes a tick carrying `sim_time`.
    pub fn emit(&self, sim_time: Duration) -> ClockTick {
        let floor = self
            .latest_tx
            .borrow()
            .map(|tick| tick.sim_time)
            .unwrap_or(Duration::ZERO);
        if sim_time < floor {
            tracing::warn!(?sim_time, ?floor, "Clock went backwards, clamping");
        }

        let tick = ClockTick {
            seq: self.next_seq.fetch_add(1, Ordering::SeqCst),
            sim_time: sim_time.max(floor),
        };

        self.latest_tx.send_replace(Some(tick));
        // No subscribers is fine: nobody is listening yet
        let _ = self.tick_tx.send(tick);
        tick
    }

    pub fn watch(&self) -> watch::Receiver<Option<ClockTick>> {
        self.latest_tx.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClockTick> {
        self.tick_tx.subscribe()
    }

    /// Number of ticks emitted so far.
    pub fn tick_count(&self) -> u64 {
        self.next_seq.load(Ordering::SeqCst)
    }
}

impl Default for TickEmitter {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emitter_sequences_ticks() {
        let emitter = TickEmitter::new(8);
        let mut rx = emitter.subscribe();

        let first = emitter.emit(Duration::from_millis(10));
        let second = emitter.emit(Duration::from_millis(20));

        assert_eq!(first.seq, 0);
        assert_eq!(second.seq, 1);
        assert_eq!(rx.try_recv().unwrap(), first);
        assert_eq!(rx.try_recv().unwrap(), second);
        assert_eq!(*emitter.watch().borrow(), Some(second));
        assert_eq!(emitter.tick_count(), 2);
    }

    #[test]
    fn test_emitter_never_goes_backwards() {
        let emitter = TickEmitter::new(8);
        emitter.emit(Duration::from_secs(2));
        let tick = emitter.emit(Duration::from_secs(1));

        assert_eq!(tick.sim_time, Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_wait_until_fails_when_clock_dropped() {
        let emitter = TickEmitter::new(8);
        let rx = emitter.watch();
        drop(emitter);

        let result = wait_until(rx, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(EnvError::ClockStopped)));
    }
}
