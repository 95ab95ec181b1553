//! Assertion oracle for fixture results.
//!
//! The oracle holds the comparison rules of the protocol:
//! - Observations compared element-wise with a relative tolerance
//! - Rewards compared to a fixed number of decimal places
//! - Done flags compared exactly
//! - Elapsed simulated time bounded by the fixture's budget
//! - Reset requests counted per fixture window

use crate::error::FixtureFailure;
use approx::relative_eq;
use rktl_env::Observation;
use std::time::Duration;

/// Element-wise float tolerance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    /// Maximum relative difference
    pub relative: f64,

    /// Absolute floor used near zero
    pub absolute: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            relative: 1e-6,
            absolute: 1e-6,
        }
    }
}

/// Compares environment output against fixture expectations.
#[derive(Debug, Clone)]
pub struct AssertionOracle {
    pub observation_tolerance: Tolerance,

    /// Decimal places rewards must agree to
    pub reward_places: u32,
}

impl Default for AssertionOracle {
    fn default() -> Self {
        Self {
            observation_tolerance: Tolerance::default(),
            reward_places: 4,
        }
    }
}

impl AssertionOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reward_places(mut self, places: u32) -> Self {
        self.reward_places = places;
        self
    }

    /// Checks the observation element by element; reports the first mismatch.
    pub fn check_observation(
        &self,
        expected: &[f64],
        actual: &Observation,
    ) -> Result<(), FixtureFailure> {
        if expected.len() != actual.len() {
            return Err(FixtureFailure::ObservationLength {
                expected: expected.len(),
                actual: actual.len(),
            });
        }

        let tol = self.observation_tolerance;
        for (index, (&e, &a)) in expected.iter().zip(actual.as_slice()).enumerate() {
            if !relative_eq!(a, e, epsilon = tol.absolute, max_relative = tol.relative) {
                return Err(FixtureFailure::ObservationMismatch {
                    index,
                    expected: e,
                    actual: a,
                });
            }
        }
        Ok(())
    }

    /// Passes when the difference rounds to zero at `reward_places` decimals.
    pub fn check_reward(&self, expected: f64, actual: f64) -> Result<(), FixtureFailure> {
        if almost_equal_places(expected, actual, self.reward_places) {
            Ok(())
        } else {
            Err(FixtureFailure::RewardMismatch {
                expected,
                actual,
                places: self.reward_places,
            })
        }
    }

    pub fn check_done(&self, expected: bool, actual: bool) -> Result<(), FixtureFailure> {
        if expected == actual {
            Ok(())
        } else {
            Err(FixtureFailure::DoneMismatch { expected, actual })
        }
    }

    /// The call must have returned no later than `started + budget`.
    pub fn check_elapsed(
        &self,
        started: Duration,
        returned: Duration,
        budget: Duration,
    ) -> Result<(), FixtureFailure> {
        let elapsed = returned.saturating_sub(started);
        if elapsed <= budget {
            Ok(())
        } else {
            Err(FixtureFailure::BudgetExceeded { elapsed, budget })
        }
    }

    /// Exactly one reset request when expected, none otherwise.
    pub fn check_reset_calls(&self, expect_reset: bool, calls: u32) -> Result<(), FixtureFailure> {
        let expected = u32::from(expect_reset);
        if calls == expected {
            Ok(())
        } else {
            Err(FixtureFailure::ResetCountMismatch {
                expected,
                actual: calls,
            })
        }
    }
}

/// `round(|a - b|, places) == 0`
pub fn almost_equal_places(a: f64, b: f64, places: u32) -> bool {
    let scale = 10f64.powi(places as i32);
    let diff = (a - b).abs();
    diff.is_finite() && (diff * scale).round() == 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_observation_within_tolerance() {
        let oracle = AssertionOracle::new();
        let actual = Observation(vec![1.0 + 1e-9, 0.0, -2.3]);

        oracle.check_observation(&[1.0, 1e-9, -2.3], &actual).unwrap();
    }

    #[test]
    fn test_observation_reports_first_mismatch() {
        let oracle = AssertionOracle::new();
        let actual = Observation(vec![0.0, 0.5, 0.7]);

        match oracle.check_observation(&[0.0, 0.4, 0.8], &actual) {
            Err(FixtureFailure::ObservationMismatch { index, expected, actual }) => {
                assert_eq!(index, 1);
                assert_eq!(expected, 0.4);
                assert_eq!(actual, 0.5);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_observation_length_mismatch() {
        let oracle = AssertionOracle::new();
        let result = oracle.check_observation(&[0.0; 9], &Observation(vec![0.0; 8]));

        assert!(matches!(
            result,
            Err(FixtureFailure::ObservationLength { expected: 9, actual: 8 })
        ));
    }

    #[test]
    fn test_nan_observation_never_matches() {
        let oracle = AssertionOracle::new();
        assert!(oracle.check_observation(&[0.0], &Observation(vec![f64::NAN])).is_err());
    }

    #[test]
    fn test_reward_four_places() {
        let oracle = AssertionOracle::new();

        oracle.check_reward(-512.1339, -512.1339065541463).unwrap();
        oracle.check_reward(998.775, 998.775_000_000_1).unwrap();
        assert!(oracle.check_reward(-2.125, -2.1251).is_err());
        assert!(oracle.check_reward(0.0, f64::NAN).is_err());
    }

    #[test]
    fn test_elapsed_budget_is_inclusive() {
        let oracle = AssertionOracle::new();
        let start = Duration::from_millis(100);
        let budget = Duration::from_millis(200);

        oracle.check_elapsed(start, Duration::from_millis(300), budget).unwrap();
        assert!(matches!(
            oracle.check_elapsed(start, Duration::from_millis(310), budget),
            Err(FixtureFailure::BudgetExceeded { .. })
        ));
    }

    #[test]
    fn test_reset_counts() {
        let oracle = AssertionOracle::new();

        oracle.check_reset_calls(true, 1).unwrap();
        oracle.check_reset_calls(false, 0).unwrap();
        assert!(oracle.check_reset_calls(true, 0).is_err());
        assert!(oracle.check_reset_calls(true, 2).is_err());
        assert!(oracle.check_reset_calls(false, 1).is_err());
    }

    #[test]
    fn test_done_exact() {
        let oracle = AssertionOracle::new();
        oracle.check_done(true, true).unwrap();
        assert!(oracle.check_done(false, true).is_err());
    }

    proptest! {
        #[test]
        fn prop_reward_close_values_match(base in -1.0e4f64..1.0e4, offset in -4.0e-5f64..4.0e-5) {
            prop_assert!(almost_equal_places(base, base + offset, 4));
        }

        #[test]
        fn prop_reward_distant_values_differ(base in -1.0e4f64..1.0e4, offset in 1.0e-3f64..1.0) {
            prop_assert!(!almost_equal_places(base, base + offset, 4));
        }
    }
}
