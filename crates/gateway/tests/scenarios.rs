//! End-to-end scenarios: the gateway driven against the simulated venue.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use auth::VenueCredentials;
use connector_core::raw::flags;
use connector_core::{RawDepthMarketData, RawPosition, VenueErrorInfo};
use connector_sim::{
    instrument, Channel, SessionBehaviour, SimRequest, SimScript, SimVenue, ORDER_NOT_FOUND,
};
use execution_core::{CorrelationError, Order, OrderRequest, OrderSide, OrderStatus, PositionEffect};
use gateway::{ChannelEngine, EngineEvent, Gateway, GatewayConfig, GatewayError};
use rust_decimal_macros::dec;
use tokio::sync::mpsc::UnboundedReceiver;

struct Harness {
    venue: Arc<SimVenue>,
    gateway: Gateway,
    events: UnboundedReceiver<EngineEvent>,
}

fn config(name: &str, require_authentication: bool) -> GatewayConfig {
    let scratch = std::env::temp_dir()
        .join(format!("gateway-scenarios-{}", std::process::id()))
        .join(name);
    GatewayConfig::from_toml_str(&format!(
        "[venue]\ntrading_address = \"tcp://sim:10000\"\nmarket_data_address = \"tcp://sim:10010\"\nscratch_dir = {:?}\nrequire_authentication = {}\n",
        scratch.display().to_string(),
        require_authentication
    ))
    .unwrap()
}

fn harness(name: &str, script: SimScript) -> Harness {
    harness_with(name, script, false)
}

fn harness_with(name: &str, script: SimScript, require_authentication: bool) -> Harness {
    let venue = SimVenue::new(script);
    let (engine, events) = ChannelEngine::new();
    let credentials =
        VenueCredentials::new("investor".into(), "9999".into(), "secret".into()).unwrap();
    let gateway = Gateway::new(
        &config(name, require_authentication),
        credentials,
        venue.trading_transport(),
        venue.market_data_transport(),
        Arc::new(engine),
    );
    Harness {
        venue,
        gateway,
        events,
    }
}

fn futures_book() -> SimScript {
    SimScript {
        instruments: vec![
            instrument("rb1705", "SHFE", 10),
            instrument("cu1705", "SHFE", 5),
        ],
        ..SimScript::default()
    }
}

async fn next_event(events: &mut UnboundedReceiver<EngineEvent>) -> EngineEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("no engine event within 5s")
        .expect("engine channel closed")
}

/// Poll `condition` until it holds, failing after 5s.
async fn eventually(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "condition not reached within 5s");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

fn subscribe_requests(venue: &SimVenue) -> Vec<Vec<String>> {
    venue
        .requests()
        .into_iter()
        .filter_map(|r| match r {
            SimRequest::Subscribe(ids) => Some(ids),
            _ => None,
        })
        .collect()
}

fn depth(instrument_id: &str, last: f64) -> RawDepthMarketData {
    RawDepthMarketData {
        instrument_id: instrument_id.into(),
        trading_day: "20170301".into(),
        update_time: "10:15:30".into(),
        update_millisec: 0,
        last_price: last,
        upper_limit_price: last * 1.25,
        lower_limit_price: last * 0.75,
        ..Default::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_start_fails_when_login_never_answered() {
    let h = harness(
        "silent_login",
        SimScript {
            login: SessionBehaviour::Silent,
            ..futures_book()
        },
    );
    let started = tokio::time::Instant::now();

    let result = h.gateway.start().await;

    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(15) && elapsed < Duration::from_secs(16));
    match result {
        Err(e @ GatewayError::StartupFailed { .. }) => {
            assert!(e.is_fatal());
            assert!(matches!(
                e,
                GatewayError::StartupFailed {
                    channel: "trading",
                    attempts: 5,
                    ..
                }
            ));
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(h.venue.login_attempts(Channel::Trading), 5);
    assert_eq!(h.venue.login_attempts(Channel::MarketData), 0);
    assert!(!h.venue.is_connected(Channel::Trading));
}

#[tokio::test(start_paused = true)]
async fn test_rejected_login_reported_in_startup_error() {
    let h = harness(
        "rejected_login",
        SimScript {
            login: SessionBehaviour::Reject(VenueErrorInfo::new(3, "invalid login")),
            ..futures_book()
        },
    );

    match h.gateway.start().await {
        Err(GatewayError::StartupFailed { last_error, .. }) => {
            assert_eq!(last_error.map(|e| e.code), Some(3));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_authentication_precedes_login() {
    let h = harness_with("authenticated_login", futures_book(), true);
    h.gateway.start().await.unwrap();

    let session_requests: Vec<_> = h
        .venue
        .requests()
        .into_iter()
        .filter(|r| {
            matches!(
                r,
                SimRequest::Authenticate {
                    channel: Channel::Trading,
                    ..
                } | SimRequest::Login {
                    channel: Channel::Trading,
                    ..
                }
            )
        })
        .collect();
    assert_eq!(session_requests.len(), 2);
    assert!(matches!(session_requests[0], SimRequest::Authenticate { .. }));
    assert!(matches!(session_requests[1], SimRequest::Login { .. }));
    assert!(h.gateway.trading().session().is_ready());
    assert!(h.gateway.quotation().session().is_ready());
    assert_eq!(h.gateway.get_available_instruments().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_authentication_reported_in_startup_error() {
    let h = harness_with(
        "rejected_authentication",
        SimScript {
            authenticate: SessionBehaviour::Reject(VenueErrorInfo::new(63, "authentication failed")),
            ..futures_book()
        },
        true,
    );

    match h.gateway.start().await {
        Err(GatewayError::StartupFailed {
            channel,
            attempts,
            last_error,
        }) => {
            assert_eq!(channel, "trading");
            assert_eq!(attempts, 5);
            assert_eq!(last_error.map(|e| e.code), Some(63));
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(h.venue.login_attempts(Channel::Trading), 0);
}

#[tokio::test]
async fn test_reconnect_logs_in_again_and_resubscribes() {
    let h = harness("reconnect", futures_book());
    h.gateway.start().await.unwrap();
    let initial = subscribe_requests(&h.venue);
    assert_eq!(initial.len(), 1);

    h.venue.drop_connection(0x1001);
    eventually(|| {
        !h.gateway.trading().session().is_ready() && !h.gateway.quotation().session().is_ready()
    })
    .await;

    h.venue.reconnect();
    eventually(|| subscribe_requests(&h.venue).len() == 2).await;
    eventually(|| h.gateway.trading().session().is_ready()).await;

    assert_eq!(subscribe_requests(&h.venue)[1], initial[0]);
    assert_eq!(h.venue.login_attempts(Channel::Trading), 2);
    assert_eq!(h.venue.login_attempts(Channel::MarketData), 2);
    assert_eq!(h.gateway.metrics().disconnects(), 2);
    assert!(h.gateway.get_positions().await.is_ok());
}

#[tokio::test]
async fn test_rejected_order_reports_error_without_order_event() {
    let mut h = harness(
        "rejected_order",
        SimScript {
            reject_orders: Some(VenueErrorInfo::new(10, "insufficient margin")),
            ..futures_book()
        },
    );
    h.gateway.start().await.unwrap();

    let order = OrderRequest::limit(
        42,
        "RB1705",
        OrderSide::Buy,
        PositionEffect::Open,
        1,
        dec!(3400),
    );
    h.gateway.submit_order(&order).unwrap();

    assert_eq!(
        next_event(&mut h.events).await,
        EngineEvent::Error {
            code: 10,
            message: "insufficient margin".into()
        }
    );
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.events.try_recv().is_err());
}

#[tokio::test]
async fn test_filled_order_pushes_order_and_trade() {
    let mut h = harness(
        "filled_order",
        SimScript {
            fill_orders: true,
            ..futures_book()
        },
    );
    h.gateway.start().await.unwrap();

    let order = OrderRequest::limit(
        7,
        "CU1705",
        OrderSide::Sell,
        PositionEffect::Open,
        2,
        dec!(47500),
    );
    h.gateway.submit_order(&order).unwrap();

    match next_event(&mut h.events).await {
        EngineEvent::Order(o) => {
            assert_eq!(o.order_id, 7);
            assert_eq!(o.status, OrderStatus::Active);
        }
        other => panic!("unexpected event: {:?}", other),
    }
    match next_event(&mut h.events).await {
        EngineEvent::Trade(t) => {
            assert_eq!(t.order_id, 7);
            assert_eq!(t.quantity, 2);
        }
        other => panic!("unexpected event: {:?}", other),
    }
    match next_event(&mut h.events).await {
        EngineEvent::Order(o) => {
            assert_eq!(o.status, OrderStatus::Filled);
            assert_eq!(o.filled_quantity, 2);
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_cancel_of_unknown_order_reports_error() {
    let mut h = harness("cancel_unknown", futures_book());
    h.gateway.start().await.unwrap();

    let order = Order {
        order_id: 99,
        order_book_id: "RB1705".into(),
        exchange_id: "SHFE".into(),
        side: OrderSide::Buy,
        position_effect: PositionEffect::Open,
        quantity: 1,
        filled_quantity: 0,
        price: dec!(3400),
        status: OrderStatus::Active,
        insert_time: None,
    };
    h.gateway.cancel_order(&order).unwrap();

    assert!(matches!(
        next_event(&mut h.events).await,
        EngineEvent::Error { code, .. } if code == ORDER_NOT_FOUND
    ));
}

#[tokio::test]
async fn test_duplicate_instrument_fragments_merge() {
    let h = harness(
        "duplicate_instruments",
        SimScript {
            instruments: vec![
                instrument("rb1705", "SHFE", 10),
                instrument("cu1705", "SHFE", 5),
                instrument("rb1705", "INE", 10),
            ],
            trailing_empty_fragment: true,
            ..SimScript::default()
        },
    );
    h.gateway.start().await.unwrap();

    let instruments = h.gateway.get_available_instruments();
    assert_eq!(instruments.len(), 2);
    assert_eq!(instruments["RB1705"].exchange_id, "INE");
    assert_eq!(instruments["CU1705"].exchange_id, "SHFE");
}

#[tokio::test]
async fn test_quotation_cache_independent_of_universe() {
    let mut h = harness("quotations", futures_book());
    h.gateway.start().await.unwrap();
    assert_eq!(
        h.venue.subscriptions(),
        ["cu1705", "rb1705"]
            .iter()
            .map(|s| s.to_string())
            .collect::<HashSet<String>>()
    );

    h.gateway.update_universe(["RB1705"]);
    h.venue.push_market_data(depth("cu1705", 47500.0)).unwrap();
    h.venue.push_market_data(depth("rb1705", 3400.0)).unwrap();

    match next_event(&mut h.events).await {
        EngineEvent::Tick(tick) => assert_eq!(tick.order_book_id, "RB1705"),
        other => panic!("unexpected event: {:?}", other),
    }
    assert!(h.events.try_recv().is_err());

    let cu = h.gateway.get_last_quotation("CU1705").unwrap();
    assert_eq!(cu.price, dec!(47500));
    assert_eq!(cu.limit_up, dec!(59375));
    assert_eq!(h.gateway.get_last_quotation("RB1705").unwrap().price, dec!(3400));
    assert!(h.gateway.get_last_quotation("AU1706").is_none());
}

#[tokio::test]
async fn test_query_retried_after_timeouts() {
    let h = harness("query_retry", futures_book());
    h.gateway.start().await.unwrap();
    tokio::time::pause();

    h.venue.configure(|script| {
        script.unanswered_queries = 2;
        script.positions = vec![
            RawPosition {
                instrument_id: "rb1705".into(),
                posi_direction: flags::POSITION_LONG,
                yd_position: 2,
                position: 2,
                ..Default::default()
            },
            RawPosition {
                instrument_id: "rb1705".into(),
                posi_direction: flags::POSITION_LONG,
                today_position: 1,
                position: 1,
                ..Default::default()
            },
        ];
    });

    let started = tokio::time::Instant::now();
    let positions = h.gateway.get_positions().await.unwrap();

    assert!(started.elapsed() >= Duration::from_secs(3));
    assert_eq!(positions.len(), 1);
    let rb = &positions["RB1705"];
    assert_eq!(rb.buy.quantity, 3);
    assert_eq!(rb.buy.old_quantity, 2);
    assert_eq!(rb.buy.today_quantity, 1);

    let query_ids: Vec<_> = h
        .venue
        .requests()
        .iter()
        .filter_map(|r| match r {
            SimRequest::QueryPositions(id) => Some(*id),
            _ => None,
        })
        .collect();
    assert_eq!(query_ids.len(), 3);
    assert!(query_ids.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(h.gateway.metrics().request_timeouts(), 2);
}

#[tokio::test]
async fn test_stop_fails_pending_request() {
    let h = harness("stop_pending", futures_book());
    h.gateway.start().await.unwrap();
    h.venue.configure(|script| script.unanswered_queries = 1);

    let pending = h.gateway.get_orders();
    let stopper = async {
        tokio::task::yield_now().await;
        h.gateway.stop()
    };
    let (result, stopped) = tokio::join!(pending, stopper);

    stopped.unwrap();
    assert!(matches!(
        result,
        Err(GatewayError::Interrupted(CorrelationError::ShuttingDown))
    ));
    assert!(!h.venue.is_connected(Channel::Trading));
    assert!(!h.venue.is_connected(Channel::MarketData));
}

#[tokio::test]
async fn test_disconnect_fails_pending_request() {
    let h = harness("disconnect_pending", futures_book());
    h.gateway.start().await.unwrap();
    h.venue.configure(|script| script.unanswered_queries = 1);

    let pending = h.gateway.get_account();
    let dropper = async {
        tokio::task::yield_now().await;
        h.venue.drop_connection(0x1001);
    };
    let (result, ()) = tokio::join!(pending, dropper);

    assert!(matches!(
        result,
        Err(GatewayError::Interrupted(CorrelationError::Disconnected))
    ));
    assert!(!h.gateway.trading().session().is_ready());
    assert!(matches!(
        h.gateway.get_positions().await,
        Err(GatewayError::NotReady)
    ));
}

#[tokio::test]
async fn test_account_query_after_start() {
    let h = harness("account", SimScript::demo());
    h.gateway.start().await.unwrap();

    let account = h.gateway.get_account().await.unwrap().unwrap();
    assert_eq!(account.account_id, "sim");
    assert_eq!(account.available, dec!(900000));

    let orders = h.gateway.get_orders().await.unwrap();
    assert!(orders.is_empty());
}
