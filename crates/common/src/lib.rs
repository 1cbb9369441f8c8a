//! Shared building blocks for the venue gateway.
//!
//! - [`LinearBackoff`]: bounded retry policy with linearly growing delays
//! - [`RequestIdSequence`]: the monotonically increasing request-id counter
//! - [`init_logging`]: process-wide tracing subscriber setup

mod backoff;
mod ids;
mod logging;

pub use backoff::LinearBackoff;
pub use ids::{RequestId, RequestIdSequence};
pub use logging::init_logging;
