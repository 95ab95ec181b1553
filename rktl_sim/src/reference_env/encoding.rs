//! Observation layout.
//!
//! `[car_x, car_y, car_heading, car_speed, car_yaw_rate, ball_x, ball_y, ball_vx, ball_vy]`

use super::sync::Snapshot;
use rktl_env::Observation;
use std::f64::consts::{PI, TAU};

pub const OBSERVATION_SIZE: usize = 9;

/// Encodes `current`; the yaw rate is derived from `previous` when there is one.
pub fn encode(current: &Snapshot, previous: Option<&Snapshot>) -> Observation {
    let car = current.car;
    let ball_velocity = current.ball.velocity();

    Observation(vec![
        car.x,
        car.y,
        car.heading,
        car.linear_speed,
        yaw_rate(current, previous),
        current.ball.x,
        current.ball.y,
        ball_velocity.x,
        ball_velocity.y,
    ])
}

fn yaw_rate(current: &Snapshot, previous: Option<&Snapshot>) -> f64 {
    let Some(previous) = previous else {
        return 0.0;
    };
    let dt = current.stamp.saturating_sub(previous.stamp).as_secs_f64();
    if dt <= 0.0 {
        return 0.0;
    }
    wrap_angle(current.car.heading - previous.car.heading) / dt
}

/// Wraps an angle into `(-pi, pi]`.
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped == -PI {
        PI
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rktl_env::{MatchState, PoseVelocity2D};
    use std::time::Duration;

    fn snapshot(ms: u64, car: PoseVelocity2D, ball: PoseVelocity2D) -> Snapshot {
        Snapshot {
            stamp: Duration::from_millis(ms),
            car,
            ball,
            status: MatchState::Ongoing,
        }
    }

    #[test]
    fn test_layout() {
        let current = snapshot(
            100,
            PoseVelocity2D::new(1.0, 0.5, -1.0),
            PoseVelocity2D::new(-2.3, 1.0, 2.0).with_heading(PI),
        );
        let obs = encode(&current, None);

        assert_eq!(obs.len(), OBSERVATION_SIZE);
        assert_eq!(&obs.as_slice()[..5], &[1.0, 0.5, 0.0, -1.0, 0.0]);
        assert_eq!(&obs.as_slice()[5..7], &[-2.3, 1.0]);
        assert_relative_eq!(obs.as_slice()[7], -2.0);
        assert!(obs.as_slice()[8].abs() < 1e-12);
    }

    #[test]
    fn test_yaw_rate_from_previous_snapshot() {
        let previous = snapshot(100, PoseVelocity2D::origin().with_heading(0.1), PoseVelocity2D::origin());
        let current = snapshot(200, PoseVelocity2D::origin().with_heading(0.3), PoseVelocity2D::origin());

        let obs = encode(&current, Some(&previous));
        assert_relative_eq!(obs.as_slice()[4], 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_yaw_rate_wraps_across_pi() {
        let previous = snapshot(0, PoseVelocity2D::origin().with_heading(PI - 0.05), PoseVelocity2D::origin());
        let current = snapshot(100, PoseVelocity2D::origin().with_heading(-PI + 0.05), PoseVelocity2D::origin());

        let obs = encode(&current, Some(&previous));
        assert_relative_eq!(obs.as_slice()[4], 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_wrap_angle() {
        assert_relative_eq!(wrap_angle(2.5 * PI), 0.5 * PI, epsilon = 1e-12);
        assert_relative_eq!(wrap_angle(-PI), PI);
        assert_relative_eq!(wrap_angle(0.5), 0.5);
    }
}
