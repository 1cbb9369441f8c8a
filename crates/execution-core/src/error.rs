//! Error types for correlated venue requests.

use common::RequestId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An explicit error code/message pair returned by the venue.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("venue error {code}: {message}")]
pub struct VenueRejection {
    pub code: i32,
    pub message: String,
}

impl VenueRejection {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Why a correlated request did not produce a value.
#[derive(Debug, Clone, Error)]
pub enum CorrelationError {
    /// No terminal callback within the wait window. The venue may still
    /// process the request; the outcome is unknown.
    #[error("request {request_id} timed out")]
    Timeout { request_id: RequestId },

    /// The venue answered the request with an error.
    #[error("request {request_id} rejected: {rejection}")]
    Rejected {
        request_id: RequestId,
        #[source]
        rejection: VenueRejection,
    },

    /// The gateway is shutting down.
    #[error("shutting down")]
    ShuttingDown,

    /// The transport dropped while the request was in flight.
    #[error("transport disconnected")]
    Disconnected,

    /// The pending entry was removed without a result being posted.
    #[error("request {request_id} abandoned")]
    Abandoned { request_id: RequestId },
}

impl CorrelationError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
