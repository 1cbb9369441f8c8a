//! The seam between the gateway and a concrete venue API.
//!
//! A transport issues requests and reports their answers through a callbacks
//! object registered at connect time. Requests return as soon as they are
//! queued; every answer arrives later on the transport's delivery context,
//! tagged with the request id it was sent with.
//!
//! Callback methods are synchronous and are invoked serially. They must never
//! wait on a pending request.

use std::path::Path;
use std::sync::Arc;

use common::RequestId;

use crate::error::TransportError;
use crate::raw::{
    RawAccount, RawCommissionRate, RawDepthMarketData, RawInstrument, RawLogin, RawOrder,
    RawPosition, RawTrade, VenueErrorInfo,
};
use crate::request::{
    AuthenticateRequest, CommissionRateQuery, InvestorRef, LoginRequest, OrderCancelRequest,
    OrderInsertRequest,
};

/// Requests shared by the trading and market-data channels.
pub trait SessionTransport: Send + Sync {
    /// Tear the channel down. The callbacks object is released.
    fn disconnect(&self) -> Result<(), TransportError>;

    fn authenticate(
        &self,
        request: &AuthenticateRequest,
        request_id: RequestId,
    ) -> Result<(), TransportError>;

    fn login(&self, request: &LoginRequest, request_id: RequestId) -> Result<(), TransportError>;
}

pub trait TradingTransport: SessionTransport {
    /// Start establishing the channel. Completion is reported through
    /// [`SessionCallbacks::on_connected`].
    fn connect(
        &self,
        address: &str,
        scratch_dir: &Path,
        callbacks: Arc<dyn TradingCallbacks>,
    ) -> Result<(), TransportError>;

    fn confirm_settlement(
        &self,
        investor: &InvestorRef,
        request_id: RequestId,
    ) -> Result<(), TransportError>;

    fn query_instruments(&self, request_id: RequestId) -> Result<(), TransportError>;

    fn query_commission_rate(
        &self,
        query: &CommissionRateQuery,
        request_id: RequestId,
    ) -> Result<(), TransportError>;

    fn query_positions(
        &self,
        investor: &InvestorRef,
        request_id: RequestId,
    ) -> Result<(), TransportError>;

    fn query_orders(
        &self,
        investor: &InvestorRef,
        request_id: RequestId,
    ) -> Result<(), TransportError>;

    fn query_account(
        &self,
        investor: &InvestorRef,
        request_id: RequestId,
    ) -> Result<(), TransportError>;

    fn insert_order(
        &self,
        request: &OrderInsertRequest,
        request_id: RequestId,
    ) -> Result<(), TransportError>;

    fn cancel_order(
        &self,
        request: &OrderCancelRequest,
        request_id: RequestId,
    ) -> Result<(), TransportError>;
}

pub trait MarketDataTransport: SessionTransport {
    fn connect(
        &self,
        address: &str,
        scratch_dir: &Path,
        callbacks: Arc<dyn MarketDataCallbacks>,
    ) -> Result<(), TransportError>;

    fn subscribe(&self, instrument_ids: &[String]) -> Result<(), TransportError>;
}

/// Session lifecycle events, common to both channels.
pub trait SessionCallbacks: Send + Sync {
    fn on_connected(&self);

    fn on_disconnected(&self, reason: i32);

    /// The venue has not heard from us for `lapse_secs`.
    fn on_heartbeat_warning(&self, lapse_secs: i32);

    /// An error not tied to a specific response kind.
    fn on_error(&self, error: VenueErrorInfo, request_id: RequestId);

    fn on_authenticate(&self, error: Option<VenueErrorInfo>, request_id: RequestId);

    fn on_login(
        &self,
        login: Option<RawLogin>,
        error: Option<VenueErrorInfo>,
        request_id: RequestId,
    );

    fn on_logout(&self, error: Option<VenueErrorInfo>, request_id: RequestId);
}

/// Responses and pushes of the trading channel.
///
/// Query responses are fragmented: one call per record, with `is_last` set
/// on the final call for the request. A query with no results is answered by
/// a single call with no record and `is_last` set.
pub trait TradingCallbacks: SessionCallbacks {
    fn on_settlement_confirm(&self, _error: Option<VenueErrorInfo>, _request_id: RequestId) {}

    fn on_instrument(
        &self,
        data: Option<RawInstrument>,
        error: Option<VenueErrorInfo>,
        request_id: RequestId,
        is_last: bool,
    );

    fn on_commission_rate(
        &self,
        data: Option<RawCommissionRate>,
        error: Option<VenueErrorInfo>,
        request_id: RequestId,
        is_last: bool,
    );

    fn on_position(
        &self,
        data: Option<RawPosition>,
        error: Option<VenueErrorInfo>,
        request_id: RequestId,
        is_last: bool,
    );

    fn on_order_query(
        &self,
        data: Option<RawOrder>,
        error: Option<VenueErrorInfo>,
        request_id: RequestId,
        is_last: bool,
    );

    fn on_account(
        &self,
        data: Option<RawAccount>,
        error: Option<VenueErrorInfo>,
        request_id: RequestId,
        is_last: bool,
    );

    /// The broker refused an order insert before it reached the exchange.
    fn on_order_insert_rejected(
        &self,
        data: Option<RawOrder>,
        error: VenueErrorInfo,
        request_id: RequestId,
    );

    fn on_order_cancel_rejected(&self, error: VenueErrorInfo, request_id: RequestId);

    /// Order state change push.
    fn on_order(&self, data: RawOrder);

    /// Fill push.
    fn on_trade(&self, data: RawTrade);
}

/// Responses and pushes of the market-data channel.
pub trait MarketDataCallbacks: SessionCallbacks {
    fn on_subscribe(&self, _instrument_id: String, _error: Option<VenueErrorInfo>) {}

    fn on_market_data(&self, data: RawDepthMarketData);
}
