//! Reset gate: serves reset requests and checks them against the driver's expectation.

use rktl_env::{ClockSource, ResetRequest, ResetRequests};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// A reset request that arrived while the driver did not expect one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateViolation {
    /// Fixture window the request fell into
    pub window: u64,

    /// 1-based index of the request within the window
    pub call_index: u32,

    /// Simulated time the request was received at
    pub sim_time: Duration,
}

/// Receives violations as soon as they happen.
pub type GateViolations = mpsc::UnboundedReceiver<GateViolation>;

#[derive(Default)]
struct GateState {
    expect_reset: AtomicBool,
    window: AtomicU64,
    window_calls: AtomicU32,
    total_calls: AtomicU64,
}

/// Server side of the reset endpoint.
///
/// The driver arms the gate before each environment call, opening a new
/// fixture window. Requests are counted per window. An expected request is
/// acknowledged; an unexpected one is rejected and reported as a
/// [`GateViolation`].
#[derive(Clone)]
pub struct ResetGate {
    state: Arc<GateState>,
    violations_tx: mpsc::UnboundedSender<GateViolation>,
}

impl ResetGate {
    /// Creates a gate and the receiver its violations are reported on.
    pub fn new() -> (Self, GateViolations) {
        let (violations_tx, violations_rx) = mpsc::unbounded_channel();
        let gate = Self {
            state: Arc::new(GateState::default()),
            violations_tx,
        };
        (gate, violations_rx)
    }

    /// Opens a new fixture window.
    pub fn arm(&self, expect_reset: bool) -> u64 {
        self.state.expect_reset.store(expect_reset, Ordering::SeqCst);
        self.state.window_calls.store(0, Ordering::SeqCst);
        self.state.window.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn expects_reset(&self) -> bool {
        self.state.expect_reset.load(Ordering::SeqCst)
    }

    /// Reset requests received in the current window.
    pub fn window_calls(&self) -> u32 {
        self.state.window_calls.load(Ordering::SeqCst)
    }

    /// Reset requests received since the gate was created.
    pub fn total_calls(&self) -> u64 {
        self.state.total_calls.load(Ordering::SeqCst)
    }

    /// Handles one request received at `sim_time`.
    pub fn handle(&self, request: ResetRequest, sim_time: Duration) -> Result<(), GateViolation> {
        let call_index = self.state.window_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.total_calls.fetch_add(1, Ordering::SeqCst);

        if self.expects_reset() {
            debug!(call_index, ?sim_time, "Reset acknowledged");
            // The requester may have given up waiting; nothing to do then
            let _ = request.reply.send(());
            return Ok(());
        }

        let violation = GateViolation {
            window: self.state.window.load(Ordering::SeqCst),
            call_index,
            sim_time,
        };
        error!(?violation, "Unexpected reset request");
        // Report before rejecting so the driver sees the violation no later
        // than the environment sees the rejection
        let _ = self.violations_tx.send(violation);
        drop(request);
        Err(violation)
    }

    /// Serves `requests` until every client is gone.
    pub fn spawn<C: ClockSource + ?Sized>(
        &self,
        clock: Arc<C>,
        mut requests: ResetRequests,
    ) -> JoinHandle<()> {
        let gate = self.clone();
        tokio::spawn(async move {
            while let Some(request) = requests.recv().await {
                // Violations are already reported on the channel
                let _ = gate.handle(request, clock.now());
            }
            debug!("Reset endpoint closed");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ManualClock;
    use rktl_env::{reset_endpoint, EnvError};

    #[tokio::test]
    async fn test_expected_reset_is_acknowledged() {
        let clock = ManualClock::shared();
        let (gate, mut violations) = ResetGate::new();
        let (client, requests) = reset_endpoint(4);
        gate.spawn(clock, requests);

        gate.arm(true);
        client.call().await.unwrap();

        assert_eq!(gate.window_calls(), 1);
        assert!(violations.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unexpected_reset_is_rejected_and_reported() {
        let clock = ManualClock::shared();
        clock.advance(Duration::from_millis(250));
        let (gate, mut violations) = ResetGate::new();
        let (client, requests) = reset_endpoint(4);
        gate.spawn(clock, requests);

        let window = gate.arm(false);
        let result = client.call().await;

        assert!(matches!(result, Err(EnvError::ResetRejected)));
        let violation = violations.recv().await.unwrap();
        assert_eq!(violation.window, window);
        assert_eq!(violation.call_index, 1);
        assert_eq!(violation.sim_time, Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_arming_opens_a_fresh_window() {
        let clock = ManualClock::shared();
        let (gate, _violations) = ResetGate::new();
        let (client, requests) = reset_endpoint(4);
        gate.spawn(clock, requests);

        gate.arm(true);
        client.call().await.unwrap();
        client.call().await.unwrap();
        assert_eq!(gate.window_calls(), 2);

        gate.arm(false);
        assert_eq!(gate.window_calls(), 0);
        assert_eq!(gate.total_calls(), 2);
        assert!(!gate.expects_reset());
    }
}
