//! Gateway error types.

use connector_core::TransportError;
use execution_core::{CorrelationError, VenueRejection};
use thiserror::Error;

/// Errors surfaced to the strategy engine and the process driving the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The transport failed to send a request or open a channel.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The venue answered a request with an error.
    #[error("{operation} rejected: {rejection}")]
    Rejected {
        operation: &'static str,
        #[source]
        rejection: VenueRejection,
    },

    /// No answer after every retry. The operation failed.
    #[error("{operation} timed out after {attempts} attempts")]
    Timeout {
        operation: &'static str,
        attempts: u32,
    },

    /// A channel could not be connected and logged in during start.
    #[error("{channel} channel failed to log in after {attempts} attempts{}", describe(last_error))]
    StartupFailed {
        channel: &'static str,
        attempts: u32,
        last_error: Option<VenueRejection>,
    },

    /// The request was cut short: shutdown, disconnect, or abandoned wait.
    #[error("request interrupted: {0}")]
    Interrupted(#[from] CorrelationError),

    #[error("unknown instrument: {0}")]
    UnknownInstrument(String),

    #[error("unexpected response to {operation}: {received}")]
    UnexpectedResponse {
        operation: &'static str,
        received: &'static str,
    },

    #[error("session not ready")]
    NotReady,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("credentials error: {0}")]
    Auth(#[from] auth::AuthError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn describe(last_error: &Option<VenueRejection>) -> String {
    match last_error {
        Some(rejection) => format!(" (last error: {})", rejection),
        None => String::new(),
    }
}

impl GatewayError {
    /// Whether the gateway cannot continue. Startup and configuration
    /// failures are fatal; a failed query or order leaves the gateway usable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::StartupFailed { .. } | Self::Config(_) | Self::Auth(_) | Self::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startup_failure_is_fatal() {
        let err = GatewayError::StartupFailed {
            channel: "trading",
            attempts: 5,
            last_error: Some(VenueRejection::new(3, "invalid login")),
        };
        assert!(err.is_fatal());
        assert_eq!(
            err.to_string(),
            "trading channel failed to log in after 5 attempts (last error: venue error 3: invalid login)"
        );
    }

    #[test]
    fn test_operation_failures_not_fatal() {
        let timeout = GatewayError::Timeout {
            operation: "query_positions",
            attempts: 5,
        };
        assert!(!timeout.is_fatal());
        assert!(!GatewayError::UnknownInstrument("XX1705".into()).is_fatal());
        assert!(!GatewayError::NotReady.is_fatal());
    }
}
