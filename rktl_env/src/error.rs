//! Error types for the RKTL environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error)]
pub enum EnvError {
    /// The clock source stopped producing ticks
    #[error("Clock stopped")]
    ClockStopped,

    /// A sensor or command channel was closed
    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    /// Nobody is serving the requested endpoint
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The reset endpoint refused the request
    #[error("Reset request rejected")]
    ResetRejected,

    /// No stable snapshot was observed within the retry budget
    #[error("No consistent snapshot after {attempts} attempts")]
    SyncTimeout { attempts: u32 },

    /// Action is not a member of the action space
    #[error("Invalid action: {0}")]
    InvalidAction(String),
}

impl EnvError {
    /// Creates a channel-closed error.
    pub fn closed(channel: impl Into<String>) -> Self {
        Self::ChannelClosed(channel.into())
    }

    /// Creates a service-unavailable error.
    pub fn unavailable(service: impl std::fmt::Display) -> Self {
        Self::ServiceUnavailable(service.to_string())
    }
}
