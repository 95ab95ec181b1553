//! Production clock source driven by a Tokio interval.

use crate::context::{ClockSource, ClockTick, TickEmitter};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Clock that advances simulated time by a fixed step on every interval tick.
///
/// The wall-clock period is `tick_period / real_time_factor`, so a factor of
/// 2.0 runs simulated time twice as fast as the wall clock. While paused, the
/// interval keeps running but no ticks are emitted and simulated time holds.
pub struct TickingClock {
    emitter: Arc<TickEmitter>,
    paused: Arc<AtomicBool>,
    tick_period: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TickingClock {
    /// Starts the clock task on the current Tokio runtime.
    pub fn start(tick_period: Duration, real_time_factor: f64) -> Arc<Self> {
        let emitter = Arc::new(TickEmitter::default());
        let paused = Arc::new(AtomicBool::new(false));

        // tokio intervals panic on a zero period
        let wall_period = Self::wall_period(tick_period, real_time_factor).max(Duration::from_nanos(1));
        let task = tokio::spawn(run_clock(
            Arc::clone(&emitter),
            Arc::clone(&paused),
            tick_period,
            wall_period,
        ));

        tracing::debug!(?tick_period, ?wall_period, "Clock started");

        Arc::new(Self {
            emitter,
            paused,
            tick_period,
            task: Mutex::new(Some(task)),
        })
    }

    /// Wall-clock time between ticks for a given real-time factor.
    pub fn wall_period(tick_period: Duration, real_time_factor: f64) -> Duration {
        tick_period.div_f64(real_time_factor.max(1e-6))
    }

    /// Simulated time added by each tick.
    pub fn tick_period(&self) -> Duration {
        self.tick_period
    }

    /// Holds simulated time until [`TickingClock::resume`].
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Stops the clock task. Waiters then observe `EnvError::ClockStopped`
    /// once the last handle to the emitter is dropped.
    pub fn stop(&self) {
        let mut task = self.task.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = task.take() {
            handle.abort();
        }
    }

    /// Number of ticks emitted so far.
    pub fn tick_count(&self) -> u64 {
        self.emitter.tick_count()
    }
}

async fn run_clock(
    emitter: Arc<TickEmitter>,
    paused: Arc<AtomicBool>,
    tick_period: Duration,
    wall_period: Duration,
) {
    let mut interval = tokio::time::interval(wall_period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut sim_time = Duration::ZERO;
    loop {
        interval.tick().await;
        if paused.load(Ordering::SeqCst) {
            continue;
        }
        sim_time += tick_period;
        emitter.emit(sim_time);
    }
}

impl Drop for TickingClock {
    fn drop(&mut self) {
        self.stop();
    }
}

#[async_trait]
impl ClockSource for TickingClock {
    fn watch(&self) -> watch::Receiver<Option<ClockTick>> {
        self.emitter.watch()
    }

    fn subscribe(&self) -> broadcast::Receiver<ClockTick> {
        self.emitter.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_ticking_clock_advances_sim_time() {
        let clock = TickingClock::start(Duration::from_millis(10), 1.0);

        let first = clock.first_tick().await.unwrap();
        assert_eq!(first.sim_time, Duration::from_millis(10));

        clock.sleep(Duration::from_millis(100)).await.unwrap();
        assert!(clock.now() >= Duration::from_millis(110));
    }

    #[tokio::test(start_paused = true)]
    async fn test_real_time_factor_scales_wall_period() {
        let clock = TickingClock::start(Duration::from_millis(10), 4.0);
        clock.first_tick().await.unwrap();

        let wall_start = tokio::time::Instant::now();
        clock.sleep(Duration::from_millis(200)).await.unwrap();
        let wall_elapsed = wall_start.elapsed();

        // 200ms of sim time at 4x takes ~50ms of (virtual) wall time
        assert!(wall_elapsed <= Duration::from_millis(60));
        assert!(wall_elapsed >= Duration::from_millis(40));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_wall_period_is_clamped() {
        assert!(TickingClock::wall_period(Duration::from_millis(10), 1.0e12).is_zero());

        let clock = TickingClock::start(Duration::from_millis(10), 1.0e12);
        let first = clock.first_tick().await.unwrap();
        assert_eq!(first.sim_time, Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_paused_clock_holds_time() {
        let clock = TickingClock::start(Duration::from_millis(10), 1.0);
        clock.first_tick().await.unwrap();

        clock.pause();
        let held = clock.now();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(clock.now(), held);
        assert!(clock.is_paused());

        clock.resume();
        clock.sleep(Duration::from_millis(30)).await.unwrap();
        assert!(clock.now() >= held + Duration::from_millis(30));
    }
}
