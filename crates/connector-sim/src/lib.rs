//! Scripted in-process venue.
//!
//! [`SimVenue`] implements both the trading and market-data transports
//! against a [`SimScript`]: canned query results with configurable
//! fragmentation, login behaviour, order acceptance and fills. Callbacks are
//! delivered serially from a tokio task per channel, like a real venue API's
//! delivery thread.
//!
//! Used for dry runs and as the venue in gateway tests.

mod script;
mod venue;

pub use script::{commission_by_money, instrument, SessionBehaviour, SimScript};
pub use venue::{
    Channel, SimMarketDataTransport, SimRequest, SimTradingTransport, SimVenue, ORDER_NOT_FOUND,
};

#[cfg(test)]
mod tests {
    use super::*;
    use common::RequestId;
    use connector_core::raw::flags;
    use connector_core::*;
    use execution_core::{OrderSide, OrderType, PositionEffect};
    use parking_lot::Mutex;
    use rust_decimal::Decimal;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Connected,
        Login(RequestId, Option<i32>),
        Instrument(Option<String>, RequestId, bool),
        Order(String, Option<char>),
        Trade(String),
        InsertRejected(RequestId, i32),
        CancelRejected(RequestId, i32),
        Other,
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<Event>>,
    }

    impl Recorder {
        fn push(&self, event: Event) {
            self.events.lock().push(event);
        }

        fn events(&self) -> Vec<Event> {
            self.events.lock().clone()
        }
    }

    impl SessionCallbacks for Recorder {
        fn on_connected(&self) {
            self.push(Event::Connected);
        }
        fn on_disconnected(&self, _reason: i32) {
            self.push(Event::Other);
        }
        fn on_heartbeat_warning(&self, _lapse_secs: i32) {}
        fn on_error(&self, _error: VenueErrorInfo, _request_id: RequestId) {
            self.push(Event::Other);
        }
        fn on_authenticate(&self, _error: Option<VenueErrorInfo>, _request_id: RequestId) {}
        fn on_login(&self, _login: Option<RawLogin>, error: Option<VenueErrorInfo>, request_id: RequestId) {
            self.push(Event::Login(request_id, error.map(|e| e.error_id)));
        }
        fn on_logout(&self, _error: Option<VenueErrorInfo>, _request_id: RequestId) {}
    }

    impl TradingCallbacks for Recorder {
        fn on_instrument(&self, data: Option<RawInstrument>, _error: Option<VenueErrorInfo>, request_id: RequestId, is_last: bool) {
            self.push(Event::Instrument(data.map(|d| d.instrument_id), request_id, is_last));
        }
        fn on_commission_rate(&self, _data: Option<RawCommissionRate>, _error: Option<VenueErrorInfo>, _request_id: RequestId, _is_last: bool) {}
        fn on_position(&self, _data: Option<RawPosition>, _error: Option<VenueErrorInfo>, _request_id: RequestId, _is_last: bool) {}
        fn on_order_query(&self, _data: Option<RawOrder>, _error: Option<VenueErrorInfo>, _request_id: RequestId, _is_last: bool) {}
        fn on_account(&self, _data: Option<RawAccount>, _error: Option<VenueErrorInfo>, _request_id: RequestId, _is_last: bool) {}
        fn on_order_insert_rejected(&self, _data: Option<RawOrder>, error: VenueErrorInfo, request_id: RequestId) {
            self.push(Event::InsertRejected(request_id, error.error_id));
        }
        fn on_order_cancel_rejected(&self, error: VenueErrorInfo, request_id: RequestId) {
            self.push(Event::CancelRejected(request_id, error.error_id));
        }
        fn on_order(&self, data: RawOrder) {
            self.push(Event::Order(data.order_ref, data.order_status));
        }
        fn on_trade(&self, data: RawTrade) {
            self.push(Event::Trade(data.order_ref));
        }
    }

    fn investor() -> InvestorRef {
        InvestorRef {
            broker_id: "9999".into(),
            investor_id: "000001".into(),
        }
    }

    fn insert(order_ref: &str) -> OrderInsertRequest {
        OrderInsertRequest {
            investor: investor(),
            instrument_id: "rb1705".into(),
            exchange_id: "SHFE".into(),
            order_ref: order_ref.into(),
            side: OrderSide::Buy,
            position_effect: PositionEffect::Open,
            order_type: OrderType::Limit,
            limit_price: Decimal::from(3412),
            volume: 1,
        }
    }

    async fn connected(script: SimScript) -> (Arc<SimVenue>, Arc<SimTradingTransport>, Arc<Recorder>) {
        let venue = SimVenue::new(script);
        let transport = venue.trading_transport();
        let recorder = Arc::new(Recorder::default());
        transport
            .connect("tcp://sim:41205", Path::new("scratch"), recorder.clone())
            .unwrap();
        (venue, transport, recorder)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test]
    async fn test_connect_then_login() {
        let (venue, transport, recorder) = connected(SimScript::default()).await;
        let auth = auth::VenueCredentials::new("000001".into(), "9999".into(), "pw".into()).unwrap();

        transport
            .login(&LoginRequest::from_credentials(&auth), 1)
            .unwrap();
        settle().await;

        assert_eq!(recorder.events(), vec![Event::Connected, Event::Login(1, None)]);
        assert_eq!(venue.login_attempts(Channel::Trading), 1);
        assert_eq!(venue.scratch_dirs(), vec![Path::new("scratch").to_path_buf()]);
    }

    #[tokio::test]
    async fn test_silent_login_never_answers() {
        let script = SimScript {
            login: SessionBehaviour::Silent,
            ..Default::default()
        };
        let (_venue, transport, recorder) = connected(script).await;
        let auth = auth::VenueCredentials::new("000001".into(), "9999".into(), "pw".into()).unwrap();

        transport
            .login(&LoginRequest::from_credentials(&auth), 1)
            .unwrap();
        settle().await;

        assert_eq!(recorder.events(), vec![Event::Connected]);
    }

    #[tokio::test]
    async fn test_query_fragments_with_trailing_empty() {
        let script = SimScript {
            instruments: vec![instrument("rb1705", "SHFE", 10), instrument("cu1705", "SHFE", 5)],
            trailing_empty_fragment: true,
            ..Default::default()
        };
        let (_venue, transport, recorder) = connected(script).await;

        transport.query_instruments(7).unwrap();
        settle().await;

        assert_eq!(
            recorder.events()[1..],
            [
                Event::Instrument(Some("rb1705".into()), 7, false),
                Event::Instrument(Some("cu1705".into()), 7, false),
                Event::Instrument(None, 7, true),
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_query_answers_with_last_flag() {
        let (_venue, transport, recorder) = connected(SimScript::default()).await;

        transport.query_instruments(3).unwrap();
        settle().await;

        assert_eq!(recorder.events()[1..], [Event::Instrument(None, 3, true)]);
    }

    #[tokio::test]
    async fn test_unanswered_queries_are_consumed() {
        let script = SimScript {
            instruments: vec![instrument("rb1705", "SHFE", 10)],
            unanswered_queries: 1,
            ..Default::default()
        };
        let (_venue, transport, recorder) = connected(script).await;

        transport.query_instruments(1).unwrap();
        transport.query_instruments(2).unwrap();
        settle().await;

        assert_eq!(
            recorder.events()[1..],
            [Event::Instrument(Some("rb1705".into()), 2, true)]
        );
    }

    #[tokio::test]
    async fn test_order_rejected() {
        let script = SimScript {
            reject_orders: Some(VenueErrorInfo::new(10, "insufficient margin")),
            ..Default::default()
        };
        let (_venue, transport, recorder) = connected(script).await;

        transport.insert_order(&insert("42"), 42).unwrap();
        settle().await;

        assert_eq!(recorder.events()[1..], [Event::InsertRejected(42, 10)]);
    }

    #[tokio::test]
    async fn test_order_filled() {
        let script = SimScript {
            fill_orders: true,
            ..Default::default()
        };
        let (_venue, transport, recorder) = connected(script).await;

        transport.insert_order(&insert("5"), 9).unwrap();
        settle().await;

        assert_eq!(
            recorder.events()[1..],
            [
                Event::Order("5".into(), Some(flags::STATUS_NO_TRADE_QUEUEING)),
                Event::Trade("5".into()),
                Event::Order("5".into(), Some(flags::STATUS_ALL_TRADED)),
            ]
        );
    }

    #[tokio::test]
    async fn test_cancel_working_and_unknown_orders() {
        let (venue, transport, recorder) = connected(SimScript::default()).await;
        transport.insert_order(&insert("5"), 1).unwrap();

        let cancel = |order_ref: &str| OrderCancelRequest {
            investor: investor(),
            instrument_id: "rb1705".into(),
            exchange_id: "SHFE".into(),
            order_ref: order_ref.into(),
            front_id: 1,
            session_id: 1,
        };
        transport.cancel_order(&cancel("5"), 2).unwrap();
        transport.cancel_order(&cancel("6"), 3).unwrap();
        settle().await;

        assert_eq!(
            recorder.events()[1..],
            [
                Event::Order("5".into(), Some(flags::STATUS_NO_TRADE_QUEUEING)),
                Event::Order("5".into(), Some(flags::STATUS_CANCELED)),
                Event::CancelRejected(3, ORDER_NOT_FOUND),
            ]
        );
        assert!(venue
            .requests()
            .iter()
            .any(|r| matches!(r, SimRequest::CancelOrder { front_id: 1, session_id: 1, .. })));
    }

    #[tokio::test]
    async fn test_refused_connect() {
        let venue = SimVenue::new(SimScript {
            refuse_connect: true,
            ..Default::default()
        });
        let transport = venue.trading_transport();
        let result = transport.connect("tcp://sim", Path::new("scratch"), Arc::new(Recorder::default()));

        assert!(matches!(result, Err(TransportError::Connect { .. })));
        assert!(!venue.is_connected(Channel::Trading));
    }

    #[tokio::test]
    async fn test_disconnect_releases_channel() {
        let (venue, transport, _recorder) = connected(SimScript::default()).await;
        transport.disconnect().unwrap();

        assert!(!venue.is_connected(Channel::Trading));
        assert!(matches!(
            transport.query_instruments(1),
            Err(TransportError::NotConnected)
        ));
    }
}
