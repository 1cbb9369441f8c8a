//! Trading-channel callback handling.
//!
//! Runs on the transport's delivery context. Nothing here waits: session
//! callbacks advance the [`SessionMachine`], query fragments go to their
//! [`QueryAggregator`], and pushes go straight to the engine.

use std::sync::Arc;

use auth::VenueCredentials;
use common::RequestId;
use connector_core::decode::{
    decode_account, decode_commission, decode_instrument, decode_order, decode_position,
    decode_trade,
};
use connector_core::{
    check_error, dispatch_session_request, DecodeError, InvestorRef, RawAccount,
    RawCommissionRate, RawInstrument, RawLogin, RawOrder, RawPosition, RawTrade, SessionCallbacks,
    SessionMachine, TradingCallbacks, TradingTransport, VenueErrorInfo,
};
use execution_core::{
    Account, Aggregate, Collection, CorrelationError, FragmentOutcome, Order, PositionSnapshot,
    QueryAggregator, SharedCorrelationTable, VenueRejection,
};
use metrics::SharedMetrics;
use model::{CommissionRate, InstrumentSnapshot};
use tracing::{debug, error, info, trace, warn};

use crate::engine::StrategyEngine;
use crate::facade::{PartialAnswers, QueryResponse};

/// Code reported when a login answer carries neither data nor an error.
const EMPTY_LOGIN_RESPONSE: i32 = -1;

/// One aggregator per query kind, all completing into the same table.
pub(crate) struct QueryAggregators {
    pub instruments: QueryAggregator<InstrumentSnapshot, QueryResponse>,
    pub commission_rates: QueryAggregator<CommissionRate, QueryResponse>,
    pub positions: QueryAggregator<PositionSnapshot, QueryResponse>,
    pub orders: QueryAggregator<Order, QueryResponse>,
    pub accounts: QueryAggregator<Account, QueryResponse>,
}

impl QueryAggregators {
    pub fn new(table: &SharedCorrelationTable<QueryResponse>) -> Self {
        Self {
            instruments: QueryAggregator::new(table.clone()),
            commission_rates: QueryAggregator::new(table.clone()),
            positions: QueryAggregator::new(table.clone()),
            orders: QueryAggregator::new(table.clone()),
            accounts: QueryAggregator::new(table.clone()),
        }
    }

    pub fn discard(&self, request_id: RequestId) -> bool {
        // Non-short-circuiting: a request id belongs to at most one kind.
        self.instruments.discard(request_id)
            | self.commission_rates.discard(request_id)
            | self.positions.discard(request_id)
            | self.orders.discard(request_id)
            | self.accounts.discard(request_id)
    }

    pub fn discard_all(&self) -> usize {
        self.instruments.discard_all()
            + self.commission_rates.discard_all()
            + self.positions.discard_all()
            + self.orders.discard_all()
            + self.accounts.discard_all()
    }
}

impl PartialAnswers for QueryAggregators {
    fn discard(&self, request_id: RequestId) -> bool {
        QueryAggregators::discard(self, request_id)
    }
}

pub(crate) struct TradingHandler {
    session: Arc<SessionMachine>,
    transport: Arc<dyn TradingTransport>,
    credentials: VenueCredentials,
    table: SharedCorrelationTable<QueryResponse>,
    aggregators: Arc<QueryAggregators>,
    engine: Arc<dyn StrategyEngine>,
    metrics: SharedMetrics,
}

impl TradingHandler {
    pub fn new(
        session: Arc<SessionMachine>,
        transport: Arc<dyn TradingTransport>,
        credentials: VenueCredentials,
        table: SharedCorrelationTable<QueryResponse>,
        engine: Arc<dyn StrategyEngine>,
        metrics: SharedMetrics,
    ) -> Self {
        let aggregators = Arc::new(QueryAggregators::new(&table));
        Self {
            session,
            transport,
            credentials,
            table,
            aggregators,
            engine,
            metrics,
        }
    }

    pub fn aggregators(&self) -> &Arc<QueryAggregators> {
        &self.aggregators
    }

    #[allow(clippy::too_many_arguments)]
    fn on_query_fragment<Raw, V>(
        &self,
        kind: &'static str,
        aggregator: &QueryAggregator<V, QueryResponse>,
        data: Option<Raw>,
        error: Option<VenueErrorInfo>,
        request_id: RequestId,
        is_last: bool,
        decode: impl Fn(&Raw) -> Result<Option<V>, DecodeError>,
    ) where
        V: Aggregate,
        QueryResponse: From<Collection<V>>,
    {
        self.metrics.inc_fragments_received();

        if let Err(rejection) = check_error(error.as_ref()) {
            self.metrics.inc_venue_errors();
            warn!(kind, request_id, code = rejection.code, message = %rejection.message, "Query answered with error");
            if !aggregator.on_error(request_id, rejection) {
                self.metrics.inc_late_responses();
            }
            return;
        }

        let record = data.and_then(|raw| match decode(&raw) {
            Ok(record) => record,
            Err(e) => {
                self.metrics.inc_decode_drops();
                warn!(kind, request_id, error = %e, "Dropping undecodable fragment");
                None
            }
        });

        match aggregator.on_fragment(request_id, record, is_last) {
            FragmentOutcome::Completed {
                delivered: false, ..
            }
            | FragmentOutcome::Discarded => {
                self.metrics.inc_late_responses();
                debug!(kind, request_id, "Late query response discarded");
            }
            FragmentOutcome::Pending | FragmentOutcome::Completed { .. } => {}
        }
    }

    fn send_session_request(&self, request: connector_core::SessionRequest) {
        self.metrics.inc_login_attempts();
        if let Err(e) = dispatch_session_request(self.transport.as_ref(), &self.credentials, request) {
            warn!(?request, error = %e, "Session request could not be sent");
        }
    }

    fn confirm_settlement(&self) {
        let request_id = self.table.next_request_id();
        let investor = InvestorRef::from_credentials(&self.credentials);
        match self.transport.confirm_settlement(&investor, request_id) {
            Ok(()) => debug!(request_id, "Settlement confirmation sent"),
            Err(e) => warn!(request_id, error = %e, "Settlement confirmation failed"),
        }
    }

    /// Report a venue error that no caller is waiting for.
    fn surface_error(&self, context: &'static str, info: &VenueErrorInfo) {
        self.metrics.inc_venue_errors();
        error!(context, code = info.error_id, message = %info.error_msg, "Venue error");
        self.engine.on_error(info.error_id, &info.error_msg);
    }
}

impl SessionCallbacks for TradingHandler {
    fn on_connected(&self) {
        info!("Trading channel connected");
        let request = self.session.on_transport_connected();
        self.send_session_request(request);
    }

    fn on_disconnected(&self, reason: i32) {
        warn!(reason, "Trading channel disconnected");
        self.metrics.inc_disconnects();
        self.session.on_disconnected();
        let failed = self.table.fail_all(CorrelationError::Disconnected);
        let discarded = self.aggregators.discard_all();
        if failed > 0 || discarded > 0 {
            info!(failed, discarded, "Pending requests failed on disconnect");
        }
    }

    fn on_heartbeat_warning(&self, lapse_secs: i32) {
        warn!(lapse_secs, "Trading channel heartbeat overdue");
    }

    fn on_error(&self, info: VenueErrorInfo, request_id: RequestId) {
        if !info.is_error() {
            return;
        }
        let rejection = info.to_rejection();
        self.session.on_error(rejection.clone());
        self.aggregators.discard(request_id);
        if self.table.fail(request_id, rejection) {
            self.metrics.inc_venue_errors();
            warn!(request_id, code = info.error_id, message = %info.error_msg, "Pending request failed by venue error");
        } else {
            self.surface_error("trading", &info);
        }
    }

    fn on_authenticate(&self, error: Option<VenueErrorInfo>, request_id: RequestId) {
        self.table.observe(request_id);
        if let Some(request) = self.session.on_authenticated(check_error(error.as_ref())) {
            self.send_session_request(request);
        }
    }

    fn on_login(&self, login: Option<RawLogin>, error: Option<VenueErrorInfo>, request_id: RequestId) {
        self.table.observe(request_id);
        let result = check_error(error.as_ref()).and_then(|()| {
            login
                .map(|l| (l.front_id, l.session_id))
                .ok_or_else(|| VenueRejection::new(EMPTY_LOGIN_RESPONSE, "empty login response"))
        });
        if self.session.on_logged_in(result) {
            self.confirm_settlement();
        }
    }

    fn on_logout(&self, error: Option<VenueErrorInfo>, request_id: RequestId) {
        self.table.observe(request_id);
        self.session.on_logged_out(check_error(error.as_ref()));
    }
}

impl TradingCallbacks for TradingHandler {
    fn on_settlement_confirm(&self, error: Option<VenueErrorInfo>, request_id: RequestId) {
        self.table.observe(request_id);
        if let Err(rejection) = check_error(error.as_ref()) {
            warn!(request_id, code = rejection.code, message = %rejection.message, "Settlement confirmation rejected");
        }
    }

    fn on_instrument(
        &self,
        data: Option<RawInstrument>,
        error: Option<VenueErrorInfo>,
        request_id: RequestId,
        is_last: bool,
    ) {
        self.on_query_fragment(
            "instrument",
            &self.aggregators.instruments,
            data,
            error,
            request_id,
            is_last,
            decode_instrument,
        );
    }

    fn on_commission_rate(
        &self,
        data: Option<RawCommissionRate>,
        error: Option<VenueErrorInfo>,
        request_id: RequestId,
        is_last: bool,
    ) {
        self.on_query_fragment(
            "commission_rate",
            &self.aggregators.commission_rates,
            data,
            error,
            request_id,
            is_last,
            |raw| decode_commission(raw).map(Some),
        );
    }

    fn on_position(
        &self,
        data: Option<RawPosition>,
        error: Option<VenueErrorInfo>,
        request_id: RequestId,
        is_last: bool,
    ) {
        self.on_query_fragment(
            "position",
            &self.aggregators.positions,
            data,
            error,
            request_id,
            is_last,
            decode_position,
        );
    }

    fn on_order_query(
        &self,
        data: Option<RawOrder>,
        error: Option<VenueErrorInfo>,
        request_id: RequestId,
        is_last: bool,
    ) {
        self.on_query_fragment(
            "order",
            &self.aggregators.orders,
            data,
            error,
            request_id,
            is_last,
            |raw| decode_order(raw, false),
        );
    }

    fn on_account(
        &self,
        data: Option<RawAccount>,
        error: Option<VenueErrorInfo>,
        request_id: RequestId,
        is_last: bool,
    ) {
        self.on_query_fragment(
            "account",
            &self.aggregators.accounts,
            data,
            error,
            request_id,
            is_last,
            |raw| decode_account(raw).map(Some),
        );
    }

    fn on_order_insert_rejected(
        &self,
        data: Option<RawOrder>,
        error: VenueErrorInfo,
        request_id: RequestId,
    ) {
        self.table.observe(request_id);
        let order_ref = data.as_ref().map(|o| o.order_ref.as_str()).unwrap_or_default();
        warn!(request_id, order_ref, "Order insert rejected");
        self.surface_error("order_insert", &error);
    }

    fn on_order_cancel_rejected(&self, error: VenueErrorInfo, request_id: RequestId) {
        self.table.observe(request_id);
        warn!(request_id, "Order cancel rejected");
        self.surface_error("order_cancel", &error);
    }

    fn on_order(&self, data: RawOrder) {
        match decode_order(&data, false) {
            Ok(Some(order)) => {
                self.metrics.inc_order_updates();
                trace!(order_id = order.order_id, status = ?order.status, "Order update");
                self.engine.on_order(order);
            }
            Ok(None) => trace!(order_ref = %data.order_ref, "Order update not tracked"),
            Err(e) => {
                self.metrics.inc_decode_drops();
                warn!(order_ref = %data.order_ref, error = %e, "Dropping undecodable order update");
            }
        }
    }

    fn on_trade(&self, data: RawTrade) {
        match decode_trade(&data) {
            Ok(trade) => {
                self.metrics.inc_trades_received();
                self.engine.on_trade(trade);
            }
            Err(e) => {
                self.metrics.inc_decode_drops();
                warn!(trade_id = %data.trade_id, error = %e, "Dropping undecodable trade");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ChannelEngine, EngineEvent};
    use common::RequestIdSequence;
    use connector_core::raw::flags;
    use connector_sim::{instrument, SimScript, SimVenue};
    use execution_core::create_correlation_table;
    use std::time::Duration;

    struct Fixture {
        handler: TradingHandler,
        table: SharedCorrelationTable<QueryResponse>,
        events: tokio::sync::mpsc::UnboundedReceiver<EngineEvent>,
        metrics: SharedMetrics,
    }

    fn fixture() -> Fixture {
        let ids = Arc::new(RequestIdSequence::new());
        let session = Arc::new(SessionMachine::new(false, ids.clone()));
        let table = create_correlation_table(ids);
        let (engine, events) = ChannelEngine::new();
        let metrics = metrics::create_metrics();
        let venue = SimVenue::new(SimScript::default());
        let credentials =
            VenueCredentials::new("investor".into(), "9999".into(), "secret".into()).unwrap();
        let handler = TradingHandler::new(
            session,
            venue.trading_transport(),
            credentials,
            table.clone(),
            Arc::new(engine),
            metrics.clone(),
        );
        Fixture {
            handler,
            table,
            events,
            metrics,
        }
    }

    fn order(order_ref: &str, status: Option<char>) -> RawOrder {
        RawOrder {
            instrument_id: "rb1705".into(),
            exchange_id: "SHFE".into(),
            order_ref: order_ref.into(),
            direction: flags::DIRECTION_BUY,
            comb_offset_flag: flags::OFFSET_OPEN,
            order_status: status,
            volume_total_original: 2,
            volume_traded: 0,
            limit_price: 3400.0,
            insert_time: None,
        }
    }

    #[tokio::test]
    async fn test_instrument_fragments_complete_pending_call() {
        let f = fixture();
        let call = f.table.register();
        let id = call.request_id();

        f.handler.on_instrument(Some(instrument("rb1705", "SHFE", 10)), None, id, false);
        f.handler.on_instrument(Some(instrument("SR705", "CZCE", 10)), None, id, false);
        f.handler.on_instrument(None, None, id, true);

        let response = f.table.wait(call, Duration::from_secs(1)).await.unwrap();
        let instruments = response.into_instruments("query_instruments").unwrap();
        assert_eq!(instruments.len(), 2);
        assert!(instruments.contains_key("SR1705"));
        assert_eq!(f.metrics.fragments_received(), 3);
    }

    #[tokio::test]
    async fn test_query_error_fails_pending_call() {
        let f = fixture();
        let call = f.table.register();
        let id = call.request_id();

        f.handler.on_position(None, Some(VenueErrorInfo::new(90, "too frequent")), id, true);

        let result = f.table.wait(call, Duration::from_secs(1)).await;
        assert!(matches!(
            result,
            Err(CorrelationError::Rejected { rejection, .. }) if rejection.code == 90
        ));
    }

    #[test]
    fn test_undecodable_fragment_is_dropped() {
        let f = fixture();
        let call = f.table.register();
        let id = call.request_id();

        let bad = order("not-a-number", Some(flags::STATUS_NO_TRADE_QUEUEING));
        f.handler.on_order_query(Some(bad), None, id, true);

        assert_eq!(f.metrics.decode_drops(), 1);
        assert!(!f.table.is_pending(id));
        drop(call);
    }

    #[test]
    fn test_insert_rejection_reaches_engine_as_error_only() {
        let mut f = fixture();
        f.handler.on_order_insert_rejected(
            Some(order("42", None)),
            VenueErrorInfo::new(10, "insufficient margin"),
            42,
        );

        assert_eq!(
            f.events.try_recv().unwrap(),
            EngineEvent::Error {
                code: 10,
                message: "insufficient margin".into()
            }
        );
        assert!(f.events.try_recv().is_err());
        assert_eq!(f.handler.table.next_request_id(), 43);
    }

    #[test]
    fn test_order_push_forwarded() {
        let mut f = fixture();
        f.handler.on_order(order("7", Some(flags::STATUS_ALL_TRADED)));
        f.handler.on_order(order("8", Some(flags::STATUS_UNKNOWN)));

        match f.events.try_recv().unwrap() {
            EngineEvent::Order(order) => assert_eq!(order.order_id, 7),
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(f.events.try_recv().is_err());
        assert_eq!(f.metrics.order_updates(), 1);
    }

    #[tokio::test]
    async fn test_disconnect_fails_pending_and_discards_partials() {
        let f = fixture();
        let call = f.table.register();
        let id = call.request_id();
        f.handler.on_instrument(Some(instrument("rb1705", "SHFE", 10)), None, id, false);

        f.handler.on_disconnected(0x1001);

        assert_eq!(f.handler.aggregators().instruments.open_requests(), 0);
        let result = f.table.wait(call, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(CorrelationError::Disconnected)));
        assert_eq!(f.metrics.disconnects(), 1);
    }

    #[tokio::test]
    async fn test_error_for_pending_request_goes_to_caller_only() {
        let mut f = fixture();
        let call = f.table.register();
        let id = call.request_id();
        f.handler.on_order_query(Some(order("1", Some(flags::STATUS_CANCELED))), None, id, false);

        f.handler.on_error(VenueErrorInfo::new(31, "insufficient funds"), id);

        assert_eq!(f.handler.aggregators().orders.open_requests(), 0);
        let result = f.table.wait(call, Duration::from_secs(1)).await;
        assert!(matches!(
            result,
            Err(CorrelationError::Rejected { rejection, .. }) if rejection.code == 31
        ));
        assert!(f.events.try_recv().is_err());
        assert_eq!(f.metrics.venue_errors(), 1);
    }

    #[test]
    fn test_unsolicited_error_notifies_engine() {
        let mut f = fixture();

        f.handler.on_error(VenueErrorInfo::new(31, "insufficient funds"), 12);

        assert_eq!(
            f.events.try_recv().unwrap(),
            EngineEvent::Error {
                code: 31,
                message: "insufficient funds".into()
            }
        );
    }

    #[test]
    fn test_fragments_after_abandon_not_accumulated() {
        let f = fixture();
        let call = f.table.register();
        let id = call.request_id();
        f.handler.on_position(None, None, id, false);
        f.table.abandon(id);

        f.handler.on_position(None, None, id, false);

        assert_eq!(f.handler.aggregators().positions.open_requests(), 0);
        assert_eq!(f.metrics.late_responses(), 1);
    }

    #[test]
    fn test_late_fragment_counted() {
        let f = fixture();
        f.handler.on_account(None, None, 77, true);
        assert_eq!(f.metrics.late_responses(), 1);
    }
}
