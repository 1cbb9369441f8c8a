use common::RequestId;
use thiserror::Error;

/// Failure of the transport itself, as opposed to an answer from the venue.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport not connected")]
    NotConnected,

    #[error("connect to {address} failed: {reason}")]
    Connect { address: String, reason: String },

    /// The API refused to queue the request (network down, flow control).
    #[error("request {request_id} refused by transport (code {code})")]
    Refused { request_id: RequestId, code: i32 },

    #[error("transport closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A venue record that fails required-field validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("missing field {0}")]
    Missing(&'static str),

    #[error("invalid {field}: {value}")]
    Invalid { field: &'static str, value: String },
}

impl DecodeError {
    pub(crate) fn invalid(field: &'static str, value: impl ToString) -> Self {
        Self::Invalid {
            field,
            value: value.to_string(),
        }
    }
}
