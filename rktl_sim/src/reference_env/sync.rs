//! Assembles consistent sensor snapshots from the three state channels.

use rktl_env::{EnvError, MatchState, PoseVelocity2D, SensorSubscription, Stamped};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, trace};

/// Car, ball and match status that share one stamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot {
    pub stamp: Duration,
    pub car: PoseVelocity2D,
    pub ball: PoseVelocity2D,
    pub status: MatchState,
}

impl Snapshot {
    /// Same car, ball and status, regardless of stamp.
    pub fn same_state(&self, other: &Snapshot) -> bool {
        self.car == other.car && self.ball == other.ball && self.status == other.status
    }
}

/// How a snapshot is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncPolicy {
    /// Consecutive identical snapshots required
    pub settle_ticks: u32,

    /// Fresh stamps to observe before giving up
    pub max_sync_attempts: u32,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            settle_ticks: 2,
            max_sync_attempts: 20,
        }
    }
}

/// Latest fresh message per channel, plus the subscription they came from.
pub struct SnapshotSynchronizer {
    sensors: SensorSubscription,
    policy: SyncPolicy,
    car: Option<Stamped<PoseVelocity2D>>,
    ball: Option<Stamped<PoseVelocity2D>>,
    status: Option<Stamped<MatchState>>,
}

impl SnapshotSynchronizer {
    pub fn new(sensors: SensorSubscription, policy: SyncPolicy) -> Self {
        Self {
            sensors,
            policy,
            car: None,
            ball: None,
            status: None,
        }
    }

    /// Waits for a settled snapshot stamped strictly after `fresh_after`.
    ///
    /// Messages stamped at or before `fresh_after` are discarded. A snapshot
    /// is accepted once `settle_ticks` consecutive stamps carry the same
    /// state; the later one is returned.
    pub async fn acquire(&mut self, fresh_after: Duration) -> Result<Snapshot, EnvError> {
        self.car = None;
        self.ball = None;
        self.status = None;

        let settle = self.policy.settle_ticks.max(1);
        let mut newest = fresh_after;
        let mut attempts = 0u32;
        let mut last_consistent: Option<Duration> = None;
        let mut run: Option<(Snapshot, u32)> = None;

        loop {
            // Channels advance in lockstep: only those not ahead of the slowest are read
            let car_at = stamp_of(&self.car, fresh_after);
            let ball_at = stamp_of(&self.ball, fresh_after);
            let status_at = stamp_of(&self.status, fresh_after);
            let floor = car_at.min(ball_at).min(status_at);

            let stamp = tokio::select! {
                msg = self.sensors.car.recv(), if car_at <= floor => {
                    accept(&mut self.car, msg, fresh_after, "car")?
                }
                msg = self.sensors.ball.recv(), if ball_at <= floor => {
                    accept(&mut self.ball, msg, fresh_after, "ball")?
                }
                msg = self.sensors.status.recv(), if status_at <= floor => {
                    accept(&mut self.status, msg, fresh_after, "status")?
                }
            };

            if let Some(stamp) = stamp {
                if stamp > newest {
                    newest = stamp;
                    attempts += 1;
                    if attempts > self.policy.max_sync_attempts {
                        debug!(attempts, ?fresh_after, "Sensor sync gave up");
                        return Err(EnvError::SyncTimeout { attempts });
                    }
                }
            }

            let Some(snapshot) = self.consistent() else {
                continue;
            };
            if last_consistent == Some(snapshot.stamp) {
                continue;
            }
            last_consistent = Some(snapshot.stamp);

            let count = match run {
                Some((previous, count)) if previous.same_state(&snapshot) => count + 1,
                _ => 1,
            };
            trace!(stamp = ?snapshot.stamp, count, "Consistent snapshot");
            if count >= settle {
                return Ok(snapshot);
            }
            run = Some((snapshot, count));
        }
    }

    fn consistent(&self) -> Option<Snapshot> {
        let (car, ball, status) = (self.car?, self.ball?, self.status?);
        if car.stamp == ball.stamp && ball.stamp == status.stamp {
            Some(Snapshot {
                stamp: car.stamp,
                car: car.value,
                ball: ball.value,
                status: status.value,
            })
        } else {
            None
        }
    }
}

fn stamp_of<T>(slot: &Option<Stamped<T>>, fresh_after: Duration) -> Duration {
    slot.as_ref().map_or(fresh_after, |msg| msg.stamp)
}

/// Stores a fresh message in `slot`; returns its stamp if it was kept.
fn accept<T>(
    slot: &mut Option<Stamped<T>>,
    msg: Result<Stamped<T>, RecvError>,
    fresh_after: Duration,
    channel: &str,
) -> Result<Option<Duration>, EnvError> {
    match msg {
        Ok(msg) if msg.stamp > fresh_after => {
            let stamp = msg.stamp;
            *slot = Some(msg);
            Ok(Some(stamp))
        }
        Ok(_) => Ok(None),
        Err(RecvError::Lagged(skipped)) => {
            debug!(channel, skipped, "Sensor subscription lagged");
            Ok(None)
        }
        Err(RecvError::Closed) => Err(EnvError::closed(channel)),
    }
}
