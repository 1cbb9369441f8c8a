//! Trading proxy: session, reference data, queries and order routing.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use auth::VenueCredentials;
use common::{RequestId, RequestIdSequence};
use connector_core::{
    dispatch_session_request, CommissionRateQuery, InvestorRef, OrderCancelRequest,
    OrderInsertRequest, SessionMachine, TradingCallbacks, TradingTransport,
};
use execution_core::{
    create_correlation_table, merge_commission, Account, Collection, CorrelationError, Order,
    OrderRequest, PositionSnapshot,
};
use metrics::SharedMetrics;
use model::{CommissionRate, InstrumentSnapshot};
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::config::GatewayConfig;
use crate::engine::StrategyEngine;
use crate::error::GatewayError;
use crate::facade::RequestFacade;
use crate::handler::TradingHandler;
use crate::retry::connect_with_retry;

/// Instrument cache owned by the trading proxy, keyed by order book id.
///
/// Replaced wholesale whenever instruments are reloaded.
pub type SharedInstrumentCache = Arc<RwLock<Collection<InstrumentSnapshot>>>;

pub struct TradingProxy {
    address: String,
    scratch_dir: PathBuf,
    credentials: VenueCredentials,
    investor: InvestorRef,
    transport: Arc<dyn TradingTransport>,
    session: Arc<SessionMachine>,
    facade: RequestFacade,
    handler: Arc<TradingHandler>,
    instruments: SharedInstrumentCache,
    metrics: SharedMetrics,
}

impl TradingProxy {
    pub fn new(
        config: &GatewayConfig,
        credentials: VenueCredentials,
        transport: Arc<dyn TradingTransport>,
        engine: Arc<dyn StrategyEngine>,
        metrics: SharedMetrics,
    ) -> Self {
        let ids = Arc::new(RequestIdSequence::new());
        let session = Arc::new(SessionMachine::new(
            config.venue.require_authentication,
            ids.clone(),
        ));
        let table = create_correlation_table(ids);
        let handler = Arc::new(TradingHandler::new(
            session.clone(),
            transport.clone(),
            credentials.clone(),
            table.clone(),
            engine,
            metrics.clone(),
        ));

        Self {
            address: config.venue.trading_address.clone(),
            scratch_dir: config.trading_scratch_dir(),
            investor: InvestorRef::from_credentials(&credentials),
            credentials,
            transport,
            session,
            facade: RequestFacade::new(table, config.backoff(), metrics.clone())
                .with_partials(handler.aggregators().clone()),
            handler,
            instruments: Arc::new(RwLock::new(HashMap::new())),
            metrics,
        }
    }

    pub fn session(&self) -> &SessionMachine {
        &self.session
    }

    /// Handle to the instrument cache, for the market-data side.
    pub fn instrument_cache(&self) -> SharedInstrumentCache {
        self.instruments.clone()
    }

    /// Connect and log in, then load instruments and their commission rates.
    ///
    /// Orders must not be submitted before this returns `Ok`.
    pub async fn start(&self) -> Result<(), GatewayError> {
        std::fs::create_dir_all(&self.scratch_dir)?;

        let callbacks: Arc<dyn TradingCallbacks> = self.handler.clone();
        connect_with_retry(
            "trading",
            &self.session,
            &self.facade.backoff(),
            || {
                self.transport
                    .connect(&self.address, &self.scratch_dir, callbacks.clone())
            },
            |request| {
                self.metrics.inc_login_attempts();
                dispatch_session_request(self.transport.as_ref(), &self.credentials, request)
            },
        )
        .await?;

        let loaded = self.load_instruments().await?;
        info!(instruments = loaded, "Trading proxy started");
        Ok(())
    }

    /// Tear the channel down. Pending requests fail with a shutdown error.
    pub fn stop(&self) -> Result<(), GatewayError> {
        let failed = self
            .facade
            .table()
            .fail_all(CorrelationError::ShuttingDown);
        let discarded = self.handler.aggregators().discard_all();
        info!(failed, discarded, "Stopping trading proxy");
        self.session.on_disconnected();
        self.transport.disconnect()?;
        Ok(())
    }

    /// Query every instrument, then the commission rate of each underlying
    /// still lacking one, and replace the cache. Returns the instrument count.
    ///
    /// A failed commission query leaves those instruments without commission
    /// data; only a failed instrument query fails the load.
    pub async fn load_instruments(&self) -> Result<usize, GatewayError> {
        let mut instruments = self.query_instruments().await?;

        let mut pending: Vec<InstrumentSnapshot> = instruments
            .values()
            .filter(|i| !i.commission_valid)
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.order_book_id.cmp(&b.order_book_id));

        let mut attempted = HashSet::new();
        for instrument in pending {
            if !attempted.insert(instrument.underlying_symbol.clone()) {
                continue;
            }
            match self.query_commission_rate(&instrument).await {
                Ok(rates) => {
                    for rate in rates.values() {
                        merge_commission(&mut instruments, rate);
                    }
                }
                Err(e @ GatewayError::Interrupted(_)) => return Err(e),
                Err(e) => warn!(
                    underlying = %instrument.underlying_symbol,
                    error = %e,
                    "Commission rate unavailable"
                ),
            }
        }

        let missing = instruments.values().filter(|i| !i.commission_valid).count();
        if missing > 0 {
            warn!(missing, "Instruments loaded without commission data");
        }
        let count = instruments.len();
        *self.instruments.write() = instruments;
        Ok(count)
    }

    pub async fn query_instruments(&self) -> Result<Collection<InstrumentSnapshot>, GatewayError> {
        const OP: &str = "query_instruments";
        self.facade
            .request(OP, |id| self.transport.query_instruments(id))
            .await?
            .into_instruments(OP)
    }

    /// Commission rates for the underlying of `instrument`.
    pub async fn query_commission_rate(
        &self,
        instrument: &InstrumentSnapshot,
    ) -> Result<Collection<CommissionRate>, GatewayError> {
        const OP: &str = "query_commission_rate";
        let query = CommissionRateQuery {
            investor: self.investor.clone(),
            instrument_id: instrument.venue_instrument_id.clone(),
            exchange_id: instrument.exchange_id.clone(),
        };
        self.facade
            .request(OP, |id| self.transport.query_commission_rate(&query, id))
            .await?
            .into_commission_rates(OP)
    }

    /// Every cached instrument.
    pub fn get_available_instruments(&self) -> Collection<InstrumentSnapshot> {
        self.instruments.read().clone()
    }

    /// One cached instrument by order book id.
    pub fn get_instrument(&self, order_book_id: &str) -> Option<InstrumentSnapshot> {
        self.instruments.read().get(order_book_id).cloned()
    }

    pub async fn get_positions(&self) -> Result<Collection<PositionSnapshot>, GatewayError> {
        const OP: &str = "query_positions";
        self.ensure_ready()?;
        self.facade
            .request(OP, |id| self.transport.query_positions(&self.investor, id))
            .await?
            .into_positions(OP)
    }

    pub async fn get_orders(&self) -> Result<Collection<Order>, GatewayError> {
        const OP: &str = "query_orders";
        self.ensure_ready()?;
        self.facade
            .request(OP, |id| self.transport.query_orders(&self.investor, id))
            .await?
            .into_orders(OP)
    }

    /// The trading account, or `None` when the venue reports none.
    pub async fn get_account(&self) -> Result<Option<Account>, GatewayError> {
        const OP: &str = "query_account";
        self.ensure_ready()?;
        let accounts = self
            .facade
            .request(OP, |id| self.transport.query_account(&self.investor, id))
            .await?
            .into_accounts(OP)?;
        Ok(accounts.into_values().next())
    }

    /// Send an order and return its request id.
    ///
    /// Acceptance, fills and rejection arrive later through the engine.
    pub fn submit_order(&self, order: &OrderRequest) -> Result<RequestId, GatewayError> {
        self.ensure_ready()?;
        let instrument = self.lookup(&order.order_book_id)?;
        let request = OrderInsertRequest::new(self.investor.clone(), order, &instrument);

        let request_id = self
            .facade
            .fire("insert_order", |id| self.transport.insert_order(&request, id))?;
        info!(
            request_id,
            order_id = order.order_id,
            order_book_id = %order.order_book_id,
            side = ?order.side,
            quantity = order.quantity,
            price = %order.price,
            "Order submitted"
        );
        Ok(request_id)
    }

    /// Request cancellation of a working order and return the request id.
    pub fn cancel_order(&self, order: &Order) -> Result<RequestId, GatewayError> {
        self.ensure_ready()?;
        let instrument = self.lookup(&order.order_book_id)?;
        let session = self.session.session();
        let request = OrderCancelRequest {
            investor: self.investor.clone(),
            instrument_id: instrument.venue_instrument_id,
            exchange_id: instrument.exchange_id,
            order_ref: order.order_id.to_string(),
            front_id: session.front_id,
            session_id: session.session_id,
        };

        let request_id = self
            .facade
            .fire("cancel_order", |id| self.transport.cancel_order(&request, id))?;
        info!(request_id, order_id = order.order_id, "Order cancel requested");
        Ok(request_id)
    }

    fn ensure_ready(&self) -> Result<(), GatewayError> {
        if self.session.is_ready() {
            Ok(())
        } else {
            Err(GatewayError::NotReady)
        }
    }

    fn lookup(&self, order_book_id: &str) -> Result<InstrumentSnapshot, GatewayError> {
        self.get_instrument(order_book_id)
            .ok_or_else(|| GatewayError::UnknownInstrument(order_book_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ChannelEngine;
    use connector_sim::{commission_by_money, instrument, SimRequest, SimScript, SimVenue};
    use execution_core::{OrderSide, PositionEffect};
    use rust_decimal_macros::dec;

    fn config() -> GatewayConfig {
        let scratch = std::env::temp_dir().join(format!("trading-proxy-test-{}", std::process::id()));
        GatewayConfig::from_toml_str(&format!(
            "[venue]\ntrading_address = \"tcp://sim:1\"\nmarket_data_address = \"tcp://sim:2\"\nscratch_dir = {:?}\n",
            scratch.display().to_string()
        ))
        .unwrap()
    }

    fn proxy(venue: &Arc<SimVenue>) -> TradingProxy {
        let (engine, _events) = ChannelEngine::new();
        let credentials =
            VenueCredentials::new("investor".into(), "9999".into(), "secret".into()).unwrap();
        TradingProxy::new(
            &config(),
            credentials,
            venue.trading_transport(),
            Arc::new(engine),
            metrics::create_metrics(),
        )
    }

    #[tokio::test]
    async fn test_start_loads_instruments_with_commission() {
        let venue = SimVenue::new(SimScript {
            instruments: vec![
                instrument("rb1705", "SHFE", 10),
                instrument("rb1710", "SHFE", 10),
                instrument("cu1705", "SHFE", 5),
            ],
            commission_rates: vec![commission_by_money("rb", 0.125, 0.125, 0.25)],
            ..SimScript::default()
        });
        let proxy = proxy(&venue);

        proxy.start().await.unwrap();

        let instruments = proxy.get_available_instruments();
        assert_eq!(instruments.len(), 3);
        let rb = proxy.get_instrument("RB1710").unwrap();
        assert!(rb.commission_valid);
        assert_eq!(rb.close_today_commission_ratio, dec!(0.25));
        assert!(!proxy.get_instrument("CU1705").unwrap().commission_valid);

        // One commission query per underlying, not per instrument.
        let commission_queries = venue
            .requests()
            .iter()
            .filter(|r| matches!(r, SimRequest::QueryCommission { .. }))
            .count();
        assert_eq!(commission_queries, 2);
        assert!(venue
            .requests()
            .iter()
            .any(|r| matches!(r, SimRequest::ConfirmSettlement(_))));
    }

    #[tokio::test]
    async fn test_orders_need_ready_session_and_known_instrument() {
        let venue = SimVenue::new(SimScript {
            instruments: vec![instrument("rb1705", "SHFE", 10)],
            ..SimScript::default()
        });
        let proxy = proxy(&venue);
        let order = OrderRequest::limit(
            1,
            "RB1705",
            OrderSide::Buy,
            PositionEffect::Open,
            1,
            dec!(3400),
        );

        assert!(matches!(proxy.submit_order(&order), Err(GatewayError::NotReady)));

        proxy.start().await.unwrap();
        let unknown = OrderRequest {
            order_book_id: "ZZ1801".into(),
            ..order.clone()
        };
        assert!(matches!(
            proxy.submit_order(&unknown),
            Err(GatewayError::UnknownInstrument(id)) if id == "ZZ1801"
        ));
        assert!(!venue
            .requests()
            .iter()
            .any(|r| matches!(r, SimRequest::InsertOrder { .. })));

        let request_id = proxy.submit_order(&order).unwrap();
        assert!(venue.requests().contains(&SimRequest::InsertOrder {
            request_id,
            order_ref: "1".into()
        }));
    }

    #[tokio::test]
    async fn test_cancel_carries_session_identity() {
        let venue = SimVenue::new(SimScript {
            instruments: vec![instrument("rb1705", "SHFE", 10)],
            front_id: 3,
            session_id: 777,
            ..SimScript::default()
        });
        let proxy = proxy(&venue);
        proxy.start().await.unwrap();

        let order = Order {
            order_id: 55,
            order_book_id: "RB1705".into(),
            exchange_id: "SHFE".into(),
            side: OrderSide::Sell,
            position_effect: PositionEffect::Close,
            quantity: 1,
            filled_quantity: 0,
            price: dec!(3400),
            status: execution_core::OrderStatus::Active,
            insert_time: None,
        };
        let request_id = proxy.cancel_order(&order).unwrap();

        assert!(venue.requests().contains(&SimRequest::CancelOrder {
            request_id,
            order_ref: "55".into(),
            front_id: 3,
            session_id: 777,
        }));
    }
}
