//! Venue connector abstractions.
//!
//! - [`transport`]: traits a concrete venue API implements, and the callback
//!   traits it reports through
//! - [`raw`]: venue records as delivered, before decoding
//! - [`decode`]: pure mapping from raw records to domain records
//! - [`session`]: the connect/authenticate/login state machine

pub mod decode;
mod error;
pub mod raw;
mod request;
pub mod session;
pub mod transport;

pub use error::{DecodeError, TransportError};
pub use raw::{
    check_error, RawAccount, RawCommissionRate, RawDepthMarketData, RawInstrument, RawLogin,
    RawOrder, RawPosition, RawTrade, VenueErrorInfo,
};
pub use request::{
    AuthenticateRequest, CommissionRateQuery, InvestorRef, LoginRequest, OrderCancelRequest,
    OrderInsertRequest,
};
pub use session::{
    dispatch_session_request, ConnectAction, Session, SessionMachine, SessionRequest,
    SessionState,
};
pub use transport::{
    MarketDataCallbacks, MarketDataTransport, SessionCallbacks, SessionTransport,
    TradingCallbacks, TradingTransport,
};
