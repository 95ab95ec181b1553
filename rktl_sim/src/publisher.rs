//! Scripted state publisher: republishes the staged sensor state on every tick.
//!
//! The publisher holds one slot per sensor channel. The protocol driver
//! stages a fixture's values between environment calls; the tick handler
//! reads the slots on every clock tick and publishes whatever is set,
//! stamped with the tick's simulated time.
//!
//! Staging never flushes a pending tick: the next tick simply picks up the
//! new values. Republishing on *every* tick (rather than once) lets an
//! environment that subscribes late, or waits for several stable ticks,
//! still observe the staged state.

use rktl_env::{ClockSource, ClockTick, MatchState, PoseVelocity2D, SensorBus, Stamped};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Values held for republication. `None` slots are not published.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StagedState {
    pub car: Option<PoseVelocity2D>,
    pub ball: Option<PoseVelocity2D>,
    pub status: Option<MatchState>,
}

impl StagedState {
    pub fn new(car: PoseVelocity2D, ball: PoseVelocity2D, status: MatchState) -> Self {
        Self {
            car: Some(car),
            ball: Some(ball),
            status: Some(status),
        }
    }
}

/// Handle to the publish slots. Clones share the same slots.
#[derive(Clone, Default)]
pub struct ScriptedStatePublisher {
    slots: Arc<Mutex<StagedState>>,
    ticks_published: Arc<AtomicU64>,
}

impl ScriptedStatePublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all slots at once.
    ///
    /// Only the driver calls this, and only while no environment call is
    /// outstanding; the tick handler sees either the old or the new state,
    /// never a mix.
    pub fn stage(&self, state: StagedState) {
        *self.lock() = state;
    }

    pub fn set_car(&self, car: PoseVelocity2D) {
        self.lock().car = Some(car);
    }

    pub fn set_ball(&self, ball: PoseVelocity2D) {
        self.lock().ball = Some(ball);
    }

    pub fn set_status(&self, status: MatchState) {
        self.lock().status = Some(status);
    }

    /// Snapshot of the currently staged values.
    pub fn staged(&self) -> StagedState {
        *self.lock()
    }

    /// Number of ticks republished so far.
    pub fn ticks_published(&self) -> u64 {
        self.ticks_published.load(Ordering::SeqCst)
    }

    /// Republishes the staged state for one tick.
    ///
    /// Returns the number of messages published (0-3).
    pub fn publish_tick(&self, bus: &SensorBus, tick: ClockTick) -> usize {
        let staged = self.staged();
        let stamp = tick.sim_time;
        let mut published = 0;

        if let Some(car) = staged.car {
            bus.publish_car(Stamped::new(stamp, car));
            published += 1;
        }
        if let Some(ball) = staged.ball {
            bus.publish_ball(Stamped::new(stamp, ball));
            published += 1;
        }
        if let Some(status) = staged.status {
            bus.publish_status(Stamped::new(stamp, status));
            published += 1;
        }

        self.ticks_published.fetch_add(1, Ordering::SeqCst);
        published
    }

    /// Spawns the tick handler.
    ///
    /// The tick subscription is taken before this returns, so no tick
    /// emitted after the call is missed. The task ends when the clock closes.
    pub fn spawn<C: ClockSource + ?Sized>(&self, clock: &C, bus: SensorBus) -> JoinHandle<()> {
        let mut ticks = clock.subscribe();
        let publisher = self.clone();

        tokio::spawn(async move {
            loop {
                match ticks.recv().await {
                    Ok(tick) => {
                        publisher.publish_tick(&bus, tick);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Publisher lagged behind the clock");
                    }
                    Err(RecvError::Closed) => {
                        debug!("Clock closed, publisher stopping");
                        break;
                    }
                }
            }
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StagedState> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ManualClock;
    use std::time::Duration;

    fn tick_at(ms: u64) -> ClockTick {
        ClockTick {
            seq: ms,
            sim_time: Duration::from_millis(ms),
        }
    }

    #[test]
    fn test_empty_slots_publish_nothing() {
        let publisher = ScriptedStatePublisher::new();
        let bus = SensorBus::new(8);
        let mut sub = bus.subscribe();

        assert_eq!(publisher.publish_tick(&bus, tick_at(10)), 0);
        assert!(sub.car.try_recv().is_err());
        assert_eq!(publisher.ticks_published(), 1);
    }

    #[test]
    fn test_republishes_every_tick_without_dedup() {
        let publisher = ScriptedStatePublisher::new();
        let bus = SensorBus::new(8);
        let mut sub = bus.subscribe();

        publisher.stage(StagedState::new(
            PoseVelocity2D::new(0.0, 0.0, 1.0),
            PoseVelocity2D::origin(),
            MatchState::Ongoing,
        ));

        publisher.publish_tick(&bus, tick_at(10));
        publisher.publish_tick(&bus, tick_at(20));

        let first = sub.car.try_recv().unwrap();
        let second = sub.car.try_recv().unwrap();
        assert_eq!(first.value, second.value);
        assert_eq!(first.stamp, Duration::from_millis(10));
        assert_eq!(second.stamp, Duration::from_millis(20));
        assert_eq!(sub.status.try_recv().unwrap().value, MatchState::Ongoing);
    }

    #[test]
    fn test_staging_replaces_all_slots() {
        let publisher = ScriptedStatePublisher::new();
        publisher.set_car(PoseVelocity2D::new(5.0, 5.0, 0.0));
        publisher.set_status(MatchState::Paused);

        let staged = StagedState {
            car: Some(PoseVelocity2D::origin()),
            ball: None,
            status: Some(MatchState::VictoryTeamA),
        };
        publisher.stage(staged);

        assert_eq!(publisher.staged(), staged);
    }

    #[test]
    fn test_single_slot_overwrite() {
        let publisher = ScriptedStatePublisher::new();
        publisher.set_ball(PoseVelocity2D::new(1.0, 0.0, 0.0));
        publisher.set_ball(PoseVelocity2D::new(2.0, 0.0, 0.0));

        assert_eq!(publisher.staged().ball.unwrap().x, 2.0);
        assert!(publisher.staged().car.is_none());
    }

    #[tokio::test]
    async fn test_spawned_publisher_follows_clock() {
        let clock = ManualClock::shared();
        let bus = SensorBus::new(16);
        let mut sub = bus.subscribe();
        let publisher = ScriptedStatePublisher::new();
        publisher.set_car(PoseVelocity2D::new(1.0, 2.0, 0.0));

        let task = publisher.spawn(clock.as_ref(), bus.clone());

        clock.advance(Duration::from_millis(10));
        let msg = sub.car.recv().await.unwrap();
        assert_eq!(msg.stamp, Duration::from_millis(10));
        assert_eq!(msg.value.y, 2.0);

        // New values are picked up by the next tick
        publisher.set_car(PoseVelocity2D::new(3.0, 4.0, 0.0));
        clock.advance(Duration::from_millis(10));
        let msg = sub.car.recv().await.unwrap();
        assert_eq!(msg.stamp, Duration::from_millis(20));
        assert_eq!(msg.value.x, 3.0);

        task.abort();
    }
}
