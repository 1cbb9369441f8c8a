//! Session lifecycle: connect, authenticate, login.
//!
//! [`SessionMachine`] holds the session flags and decides which request to
//! send next. It never talks to the transport itself; every transition
//! returns the [`SessionRequest`] the caller must dispatch, and
//! [`dispatch_session_request`] does that for callers holding credentials.
//!
//! ```text
//! Disconnected -> Connecting -> [Authenticating] -> LoggingIn -> Ready
//!       ^                                                          |
//!       +-------------------- transport lost ----------------------+
//! ```

use std::sync::Arc;
use std::time::Duration;

use auth::VenueCredentials;
use common::{RequestId, RequestIdSequence};
use execution_core::VenueRejection;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::TransportError;
use crate::request::{AuthenticateRequest, LoginRequest};
use crate::transport::SessionTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    /// Channel requested, waiting for the transport to come up.
    Connecting,
    /// Transport up, authentication outstanding.
    Authenticating,
    /// Transport up, login outstanding.
    LoggingIn,
    Ready,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Disconnected => write!(f, "DISCONNECTED"),
            SessionState::Connecting => write!(f, "CONNECTING"),
            SessionState::Authenticating => write!(f, "AUTHENTICATING"),
            SessionState::LoggingIn => write!(f, "LOGGING_IN"),
            SessionState::Ready => write!(f, "READY"),
        }
    }
}

/// Session flags. `logged_in` implies `transport_connected`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub transport_connected: bool,
    pub authenticated: bool,
    pub logged_in: bool,
    pub front_id: i32,
    pub session_id: i32,
}

/// A session request the caller must send, tagged with its request id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRequest {
    Authenticate(RequestId),
    Login(RequestId),
}

/// What `begin_connect` asks the caller to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectAction {
    /// Establish the transport channel.
    OpenChannel,
    /// Ready, or a connect is already under way.
    AlreadyActive,
    /// Transport is up but the session is not; send this again.
    Resend(SessionRequest),
}

pub struct SessionMachine {
    require_authentication: bool,
    ids: Arc<RequestIdSequence>,
    session: Mutex<Session>,
    state: watch::Sender<SessionState>,
    last_error: Mutex<Option<VenueRejection>>,
}

impl SessionMachine {
    pub fn new(require_authentication: bool, ids: Arc<RequestIdSequence>) -> Self {
        let (state, _) = watch::channel(SessionState::Disconnected);
        Self {
            require_authentication,
            ids,
            session: Mutex::new(Session::default()),
            state,
            last_error: Mutex::new(None),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == SessionState::Ready
    }

    pub fn session(&self) -> Session {
        self.session.lock().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Most recent error reported during authenticate/login/logout.
    pub fn last_error(&self) -> Option<VenueRejection> {
        self.last_error.lock().clone()
    }

    pub fn begin_connect(&self) -> ConnectAction {
        let session = self.session.lock();
        match self.state() {
            SessionState::Ready | SessionState::Connecting => ConnectAction::AlreadyActive,
            SessionState::Disconnected => {
                self.set_state(SessionState::Connecting);
                ConnectAction::OpenChannel
            }
            SessionState::Authenticating | SessionState::LoggingIn => {
                ConnectAction::Resend(self.next_request(&session))
            }
        }
    }

    /// The channel could not be opened; fall back so the next
    /// `begin_connect` tries again.
    pub fn connect_failed(&self) {
        let _session = self.session.lock();
        if self.state() == SessionState::Connecting {
            self.set_state(SessionState::Disconnected);
        }
    }

    pub fn on_transport_connected(&self) -> SessionRequest {
        let mut session = self.session.lock();
        session.transport_connected = true;
        self.next_request(&session)
    }

    /// Returns the login to send when authentication succeeded.
    pub fn on_authenticated(&self, result: Result<(), VenueRejection>) -> Option<SessionRequest> {
        let mut session = self.session.lock();
        match result {
            Ok(()) => {
                session.authenticated = true;
                Some(self.next_request(&session))
            }
            Err(rejection) => {
                warn!(code = rejection.code, message = %rejection.message, "Authentication failed");
                self.record_error(rejection);
                None
            }
        }
    }

    /// Returns whether the session became ready.
    pub fn on_logged_in(&self, result: Result<(i32, i32), VenueRejection>) -> bool {
        let mut session = self.session.lock();
        match result {
            Ok(_) if !session.transport_connected => {
                warn!("Login response without a connected transport, ignoring");
                false
            }
            Ok((front_id, session_id)) => {
                session.front_id = front_id;
                session.session_id = session_id;
                session.logged_in = true;
                self.set_state(SessionState::Ready);
                info!(front_id, session_id, "Session ready");
                true
            }
            Err(rejection) => {
                warn!(code = rejection.code, message = %rejection.message, "Login failed");
                self.record_error(rejection);
                false
            }
        }
    }

    pub fn on_logged_out(&self, result: Result<(), VenueRejection>) {
        let mut session = self.session.lock();
        match result {
            Ok(()) => {
                session.logged_in = false;
                if session.transport_connected {
                    self.set_state(self.pending_state(&session));
                }
                info!("Logged out");
            }
            Err(rejection) => self.record_error(rejection),
        }
    }

    pub fn on_disconnected(&self) {
        let mut session = self.session.lock();
        session.transport_connected = false;
        session.logged_in = false;
        session.authenticated = false;
        self.set_state(SessionState::Disconnected);
    }

    /// Record an error pushed outside a specific response.
    pub fn on_error(&self, rejection: VenueRejection) {
        self.record_error(rejection);
    }

    /// Wait until the session is ready, up to `timeout`.
    pub async fn wait_ready(&self, timeout: Duration) -> bool {
        let mut rx = self.state.subscribe();
        let ready = tokio::time::timeout(timeout, rx.wait_for(|s| *s == SessionState::Ready)).await;
        matches!(ready, Ok(Ok(_)))
    }

    fn pending_state(&self, session: &Session) -> SessionState {
        if self.require_authentication && !session.authenticated {
            SessionState::Authenticating
        } else {
            SessionState::LoggingIn
        }
    }

    fn next_request(&self, session: &Session) -> SessionRequest {
        let state = self.pending_state(session);
        self.set_state(state);
        let request_id = self.ids.next_id();
        debug!(request_id, state = %state, "Session request issued");
        match state {
            SessionState::Authenticating => SessionRequest::Authenticate(request_id),
            _ => SessionRequest::Login(request_id),
        }
    }

    fn set_state(&self, state: SessionState) {
        self.state.send_replace(state);
    }

    fn record_error(&self, rejection: VenueRejection) {
        *self.last_error.lock() = Some(rejection);
    }
}

/// Send a session request built from `credentials`.
pub fn dispatch_session_request<T: SessionTransport + ?Sized>(
    transport: &T,
    credentials: &VenueCredentials,
    request: SessionRequest,
) -> Result<(), TransportError> {
    match request {
        SessionRequest::Authenticate(request_id) => {
            transport.authenticate(&AuthenticateRequest::from_credentials(credentials), request_id)
        }
        SessionRequest::Login(request_id) => {
            transport.login(&LoginRequest::from_credentials(credentials), request_id)
        }
    }
}
