//! Sensor channels and the reset-request endpoint.

use crate::error::EnvError;
use crate::types::{ControlCommand, MatchState, PoseVelocity2D, Stamped};
use tokio::sync::{broadcast, mpsc, oneshot};

/// Publish side of the simulated sensor topics.
///
/// ```text
/// Publisher                  SensorBus                 Environment
///   |-- publish_car() ----------->|                          |
///   |-- publish_ball() ---------->|------ broadcast -------->| car / ball / status
///   |-- publish_status() -------->|                          |
///   |                             |<----- publish_command() -| control
/// ```
///
/// Every channel is a broadcast channel: each subscriber sees every message
/// published after it subscribed, and a slow subscriber skips ahead rather
/// than blocking publishers.
#[derive(Clone)]
pub struct SensorBus {
    car: broadcast::Sender<Stamped<PoseVelocity2D>>,
    ball: broadcast::Sender<Stamped<PoseVelocity2D>>,
    status: broadcast::Sender<Stamped<MatchState>>,
    command: broadcast::Sender<Stamped<ControlCommand>>,
}

impl SensorBus {
    /// Creates a bus whose subscribers may lag by up to `capacity` messages per channel.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            car: broadcast::channel(capacity).0,
            ball: broadcast::channel(capacity).0,
            status: broadcast::channel(capacity).0,
            command: broadcast::channel(capacity).0,
        }
    }

    /// Returns the number of subscribers that received the message.
    pub fn publish_car(&self, msg: Stamped<PoseVelocity2D>) -> usize {
        self.car.send(msg).unwrap_or(0)
    }

    pub fn publish_ball(&self, msg: Stamped<PoseVelocity2D>) -> usize {
        self.ball.send(msg).unwrap_or(0)
    }

    pub fn publish_status(&self, msg: Stamped<MatchState>) -> usize {
        self.status.send(msg).unwrap_or(0)
    }

    pub fn publish_command(&self, msg: Stamped<ControlCommand>) -> usize {
        self.command.send(msg).unwrap_or(0)
    }

    /// Subscribes to the three sensor topics.
    pub fn subscribe(&self) -> SensorSubscription {
        SensorSubscription {
            car: self.car.subscribe(),
            ball: self.ball.subscribe(),
            status: self.status.subscribe(),
        }
    }

    /// Subscribes to control commands published by environments.
    pub fn subscribe_commands(&self) -> broadcast::Receiver<Stamped<ControlCommand>> {
        self.command.subscribe()
    }
}

impl Default for SensorBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Receive side of the sensor topics.
pub struct SensorSubscription {
    pub car: broadcast::Receiver<Stamped<PoseVelocity2D>>,
    pub ball: broadcast::Receiver<Stamped<PoseVelocity2D>>,
    pub status: broadcast::Receiver<Stamped<MatchState>>,
}

/// A pending reset request. Dropping `reply` without sending rejects it.
#[derive(Debug)]
pub struct ResetRequest {
    pub reply: oneshot::Sender<()>,
}

/// Server side of the reset endpoint.
pub type ResetRequests = mpsc::Receiver<ResetRequest>;

/// Client side of the reset endpoint, held by the environment.
#[derive(Debug, Clone)]
pub struct ResetClient {
    tx: mpsc::Sender<ResetRequest>,
}

impl ResetClient {
    /// Requests a simulation reset and waits for the acknowledgment.
    ///
    /// # Returns
    /// * `Ok(())` - The reset was acknowledged
    /// * `Err(EnvError::ServiceUnavailable)` - Nobody serves the endpoint
    /// * `Err(EnvError::ResetRejected)` - The server dropped the request
    pub async fn call(&self) -> Result<(), EnvError> {
        let (reply, ack) = oneshot::channel();
        self.tx
            .send(ResetRequest { reply })
            .await
            .map_err(|_| EnvError::unavailable("reset"))?;
        ack.await.map_err(|_| EnvError::ResetRejected)
    }
}

/// Creates a connected reset client/server pair.
pub fn reset_endpoint(capacity: usize) -> (ResetClient, ResetRequests) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ResetClient { tx }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_bus_delivers_to_subscribers() {
        let bus = SensorBus::new(4);
        let mut sub = bus.subscribe();

        let stamp = Duration::from_millis(10);
        assert_eq!(bus.publish_car(Stamped::new(stamp, PoseVelocity2D::new(1.0, 2.0, 0.0))), 1);
        assert_eq!(bus.publish_status(Stamped::new(stamp, MatchState::Ongoing)), 1);

        assert_eq!(sub.car.try_recv().unwrap().value.x, 1.0);
        assert_eq!(sub.status.try_recv().unwrap().value, MatchState::Ongoing);
        assert!(sub.ball.try_recv().is_err());
    }

    #[test]
    fn test_publish_without_subscribers_is_not_an_error() {
        let bus = SensorBus::new(4);
        assert_eq!(bus.publish_ball(Stamped::new(Duration::ZERO, PoseVelocity2D::origin())), 0);
    }

    #[tokio::test]
    async fn test_reset_endpoint_ack() {
        let (client, mut requests) = reset_endpoint(1);
        let server = tokio::spawn(async move {
            let req = requests.recv().await.unwrap();
            req.reply.send(()).unwrap();
        });

        client.call().await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_reset_endpoint_rejects_dropped_request() {
        let (client, mut requests) = reset_endpoint(1);
        tokio::spawn(async move {
            let req = requests.recv().await.unwrap();
            drop(req);
        });

        assert!(matches!(client.call().await, Err(EnvError::ResetRejected)));
    }

    #[tokio::test]
    async fn test_reset_endpoint_without_server() {
        let (client, requests) = reset_endpoint(1);
        drop(requests);

        assert!(matches!(client.call().await, Err(EnvError::ServiceUnavailable(_))));
    }
}
