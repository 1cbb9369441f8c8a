//! Bounded connect-and-login for one channel.

use common::LinearBackoff;
use connector_core::{ConnectAction, SessionMachine, SessionRequest, TransportError};
use tracing::{info, warn};

use crate::error::GatewayError;

/// Drive a channel to the ready state.
///
/// Each attempt asks the session machine what to do: open the channel, or
/// re-send the pending authenticate/login on a channel that is already up.
/// The attempt then waits `backoff.delay_for(attempt)` for the session to
/// become ready.
pub async fn connect_with_retry<O, R>(
    channel: &'static str,
    session: &SessionMachine,
    backoff: &LinearBackoff,
    mut open_channel: O,
    mut resend: R,
) -> Result<(), GatewayError>
where
    O: FnMut() -> Result<(), TransportError>,
    R: FnMut(SessionRequest) -> Result<(), TransportError>,
{
    for attempt in backoff.attempts() {
        match session.begin_connect() {
            ConnectAction::OpenChannel => {
                info!(channel, attempt, "Opening channel");
                if let Err(e) = open_channel() {
                    warn!(channel, attempt, error = %e, "Channel open failed");
                    session.connect_failed();
                }
            }
            ConnectAction::Resend(request) => {
                info!(channel, attempt, ?request, "Re-sending session request");
                if let Err(e) = resend(request) {
                    warn!(channel, attempt, error = %e, "Session request failed");
                }
            }
            ConnectAction::AlreadyActive => {}
        }

        if session.wait_ready(backoff.delay_for(attempt)).await {
            return Ok(());
        }
        warn!(
            channel,
            attempt,
            max_attempts = backoff.max_attempts(),
            state = %session.state(),
            "Channel not ready"
        );
    }

    Err(GatewayError::StartupFailed {
        channel,
        attempts: backoff.max_attempts(),
        last_error: session.last_error(),
    })
}
