use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::RequestId;
use connector_core::raw::flags;
use connector_core::{
    AuthenticateRequest, CommissionRateQuery, InvestorRef, LoginRequest, MarketDataCallbacks,
    MarketDataTransport, OrderCancelRequest, OrderInsertRequest, RawDepthMarketData, RawLogin,
    RawOrder, RawTrade, SessionCallbacks, SessionTransport, TradingCallbacks, TradingTransport,
    TransportError, VenueErrorInfo,
};
use execution_core::{OrderSide, OrderType, PositionEffect};
use model::symbology;
use parking_lot::Mutex;
use rust_decimal::prelude::ToPrimitive;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::script::{SessionBehaviour, SimScript};

/// Error code used when a cancel names an order the venue does not know.
pub const ORDER_NOT_FOUND: i32 = 25;

/// A request received by the simulated venue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimRequest {
    Connect { channel: Channel, address: String },
    Disconnect(Channel),
    Authenticate { channel: Channel, request_id: RequestId },
    Login { channel: Channel, request_id: RequestId },
    ConfirmSettlement(RequestId),
    QueryInstruments(RequestId),
    QueryCommission { request_id: RequestId, instrument_id: String },
    QueryPositions(RequestId),
    QueryOrders(RequestId),
    QueryAccount(RequestId),
    InsertOrder { request_id: RequestId, order_ref: String },
    CancelOrder {
        request_id: RequestId,
        order_ref: String,
        front_id: i32,
        session_id: i32,
    },
    Subscribe(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Trading,
    MarketData,
}

type Delivery = Box<dyn FnOnce() + Send>;

/// Serial delivery context: callbacks run one at a time on a task, in the
/// order they were posted.
fn spawn_mailbox(delay: Duration) -> mpsc::UnboundedSender<Delivery> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Delivery>();
    tokio::spawn(async move {
        while let Some(deliver) = rx.recv().await {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            deliver();
        }
    });
    tx
}

struct Link<C: ?Sized> {
    callbacks: Arc<C>,
    mailbox: mpsc::UnboundedSender<Delivery>,
}

/// Answer to an authenticate or login request.
enum SessionReply {
    Authenticate(Option<VenueErrorInfo>),
    Login(Option<RawLogin>, Option<VenueErrorInfo>),
}

impl SessionReply {
    fn deliver<C: SessionCallbacks + ?Sized>(self, callbacks: &C, request_id: RequestId) {
        match self {
            SessionReply::Authenticate(error) => callbacks.on_authenticate(error, request_id),
            SessionReply::Login(login, error) => callbacks.on_login(login, error, request_id),
        }
    }
}

/// An in-process venue that answers both channels from a [`SimScript`].
pub struct SimVenue {
    script: Mutex<SimScript>,
    trading: Mutex<Option<Link<dyn TradingCallbacks>>>,
    market_data: Mutex<Option<Link<dyn MarketDataCallbacks>>>,
    requests: Mutex<Vec<SimRequest>>,
    working_orders: Mutex<HashMap<String, RawOrder>>,
    subscriptions: Mutex<HashSet<String>>,
    scratch_dirs: Mutex<Vec<PathBuf>>,
    next_trade_id: AtomicU64,
}

impl SimVenue {
    pub fn new(script: SimScript) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            trading: Mutex::new(None),
            market_data: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            working_orders: Mutex::new(HashMap::new()),
            subscriptions: Mutex::new(HashSet::new()),
            scratch_dirs: Mutex::new(Vec::new()),
            next_trade_id: AtomicU64::new(1),
        })
    }

    pub fn trading_transport(self: &Arc<Self>) -> Arc<SimTradingTransport> {
        Arc::new(SimTradingTransport(self.clone()))
    }

    pub fn market_data_transport(self: &Arc<Self>) -> Arc<SimMarketDataTransport> {
        Arc::new(SimMarketDataTransport(self.clone()))
    }

    /// Change the script. Affects requests received afterwards.
    pub fn configure(&self, f: impl FnOnce(&mut SimScript)) {
        f(&mut self.script.lock());
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<SimRequest> {
        self.requests.lock().clone()
    }

    pub fn login_attempts(&self, channel: Channel) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| matches!(r, SimRequest::Login { channel: c, .. } if *c == channel))
            .count()
    }

    pub fn subscriptions(&self) -> HashSet<String> {
        self.subscriptions.lock().clone()
    }

    /// Scratch directories passed to `connect`, in order.
    pub fn scratch_dirs(&self) -> Vec<PathBuf> {
        self.scratch_dirs.lock().clone()
    }

    pub fn is_connected(&self, channel: Channel) -> bool {
        match channel {
            Channel::Trading => self.trading.lock().is_some(),
            Channel::MarketData => self.market_data.lock().is_some(),
        }
    }

    /// Push a depth market-data update on the market-data channel.
    pub fn push_market_data(&self, data: RawDepthMarketData) -> Result<(), TransportError> {
        self.post_market_data(move |cb| cb.on_market_data(data))
    }

    pub fn push_order(&self, data: RawOrder) -> Result<(), TransportError> {
        self.post_trading(move |cb| cb.on_order(data))
    }

    pub fn push_trade(&self, data: RawTrade) -> Result<(), TransportError> {
        self.post_trading(move |cb| cb.on_trade(data))
    }

    pub fn push_error(&self, error: VenueErrorInfo) -> Result<(), TransportError> {
        self.post_trading(move |cb| cb.on_error(error, 0))
    }

    pub fn push_heartbeat_warning(&self, lapse_secs: i32) -> Result<(), TransportError> {
        self.post_trading(move |cb| cb.on_heartbeat_warning(lapse_secs))
    }

    /// Drop both channels as if the network went away. The channels stay
    /// registered so a reconnect can be simulated with [`SimVenue::reconnect`].
    pub fn drop_connection(&self, reason: i32) {
        let _ = self.post_trading(move |cb| cb.on_disconnected(reason));
        let _ = self.post_market_data(move |cb| cb.on_disconnected(reason));
    }

    /// Report the channels connected again.
    pub fn reconnect(&self) {
        let _ = self.post_trading(|cb| cb.on_connected());
        let _ = self.post_market_data(|cb| cb.on_connected());
    }

    fn record(&self, request: SimRequest) {
        debug!(?request, "Simulated venue received request");
        self.requests.lock().push(request);
    }

    fn post_trading(
        &self,
        f: impl FnOnce(&dyn TradingCallbacks) + Send + 'static,
    ) -> Result<(), TransportError> {
        let guard = self.trading.lock();
        let link = guard.as_ref().ok_or(TransportError::NotConnected)?;
        let callbacks = link.callbacks.clone();
        link.mailbox
            .send(Box::new(move || f(callbacks.as_ref())))
            .map_err(|_| TransportError::Closed)
    }

    fn post_market_data(
        &self,
        f: impl FnOnce(&dyn MarketDataCallbacks) + Send + 'static,
    ) -> Result<(), TransportError> {
        let guard = self.market_data.lock();
        let link = guard.as_ref().ok_or(TransportError::NotConnected)?;
        let callbacks = link.callbacks.clone();
        link.mailbox
            .send(Box::new(move || f(callbacks.as_ref())))
            .map_err(|_| TransportError::Closed)
    }

    fn post_session(
        &self,
        channel: Channel,
        reply: SessionReply,
        request_id: RequestId,
    ) -> Result<(), TransportError> {
        match channel {
            Channel::Trading => self.post_trading(move |cb| reply.deliver(cb, request_id)),
            Channel::MarketData => self.post_market_data(move |cb| reply.deliver(cb, request_id)),
        }
    }

    fn open(&self, channel: Channel, address: &str, scratch_dir: &Path) -> Result<Duration, TransportError> {
        self.record(SimRequest::Connect {
            channel,
            address: address.to_string(),
        });
        self.scratch_dirs.lock().push(scratch_dir.to_path_buf());
        let script = self.script.lock();
        if script.refuse_connect {
            return Err(TransportError::Connect {
                address: address.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        info!(?channel, address, "Simulated channel opened");
        Ok(script.response_delay)
    }

    fn close(&self, channel: Channel) {
        self.record(SimRequest::Disconnect(channel));
        match channel {
            Channel::Trading => {
                self.trading.lock().take();
            }
            Channel::MarketData => {
                self.market_data.lock().take();
            }
        }
    }

    fn answer_authenticate(&self, channel: Channel, request_id: RequestId) -> Result<(), TransportError> {
        self.record(SimRequest::Authenticate { channel, request_id });
        match self.script.lock().authenticate.clone() {
            SessionBehaviour::Accept => {
                self.post_session(channel, SessionReply::Authenticate(None), request_id)
            }
            SessionBehaviour::Reject(error) => {
                self.post_session(channel, SessionReply::Authenticate(Some(error)), request_id)
            }
            SessionBehaviour::Silent => Ok(()),
        }
    }

    fn answer_login(&self, channel: Channel, request_id: RequestId) -> Result<(), TransportError> {
        self.record(SimRequest::Login { channel, request_id });
        let script = self.script.lock().clone();
        match script.login {
            SessionBehaviour::Accept => {
                let login = RawLogin {
                    front_id: script.front_id,
                    session_id: script.session_id,
                    trading_day: script.trading_day,
                };
                self.post_session(channel, SessionReply::Login(Some(login), None), request_id)
            }
            SessionBehaviour::Reject(error) => {
                self.post_session(channel, SessionReply::Login(None, Some(error)), request_id)
            }
            SessionBehaviour::Silent => Ok(()),
        }
    }

    /// Consume one unanswered query from the script, if any remain.
    fn swallow_query(&self) -> bool {
        let mut script = self.script.lock();
        if script.unanswered_queries > 0 {
            script.unanswered_queries -= 1;
            true
        } else {
            false
        }
    }

    /// Answer a query with one fragment per record.
    fn answer_fragments<T, F>(&self, request_id: RequestId, records: Vec<T>, deliver: F) -> Result<(), TransportError>
    where
        T: Send + 'static,
        F: Fn(&dyn TradingCallbacks, Option<T>, RequestId, bool) + Send + Sync + Clone + 'static,
    {
        if self.swallow_query() {
            debug!(request_id, "Leaving query unanswered");
            return Ok(());
        }
        let trailing_empty = self.script.lock().trailing_empty_fragment;
        let count = records.len();
        for (i, record) in records.into_iter().enumerate() {
            let is_last = !trailing_empty && i + 1 == count;
            let deliver = deliver.clone();
            self.post_trading(move |cb| deliver(cb, Some(record), request_id, is_last))?;
        }
        if trailing_empty || count == 0 {
            self.post_trading(move |cb| deliver(cb, None, request_id, true))?;
        }
        Ok(())
    }

    fn submitted_order(request: &OrderInsertRequest) -> RawOrder {
        RawOrder {
            instrument_id: request.instrument_id.clone(),
            exchange_id: request.exchange_id.clone(),
            order_ref: request.order_ref.clone(),
            direction: match request.side {
                OrderSide::Buy => flags::DIRECTION_BUY,
                OrderSide::Sell => flags::DIRECTION_SELL,
            },
            comb_offset_flag: match request.position_effect {
                PositionEffect::Open => flags::OFFSET_OPEN,
                PositionEffect::Close => flags::OFFSET_CLOSE,
                PositionEffect::CloseToday => flags::OFFSET_CLOSE_TODAY,
            },
            order_status: None,
            volume_total_original: request.volume,
            volume_traded: 0,
            limit_price: request.limit_price.to_f64().unwrap_or_default(),
            insert_time: None,
        }
    }
}

/// Trading channel of a [`SimVenue`].
pub struct SimTradingTransport(Arc<SimVenue>);

/// Market-data channel of a [`SimVenue`].
pub struct SimMarketDataTransport(Arc<SimVenue>);

impl SessionTransport for SimTradingTransport {
    fn disconnect(&self) -> Result<(), TransportError> {
        self.0.close(Channel::Trading);
        Ok(())
    }

    fn authenticate(&self, _request: &AuthenticateRequest, request_id: RequestId) -> Result<(), TransportError> {
        self.0.answer_authenticate(Channel::Trading, request_id)
    }

    fn login(&self, _request: &LoginRequest, request_id: RequestId) -> Result<(), TransportError> {
        self.0.answer_login(Channel::Trading, request_id)
    }
}

impl TradingTransport for SimTradingTransport {
    fn connect(
        &self,
        address: &str,
        scratch_dir: &Path,
        callbacks: Arc<dyn TradingCallbacks>,
    ) -> Result<(), TransportError> {
        let delay = self.0.open(Channel::Trading, address, scratch_dir)?;
        *self.0.trading.lock() = Some(Link {
            callbacks,
            mailbox: spawn_mailbox(delay),
        });
        self.0.post_trading(|cb| cb.on_connected())
    }

    fn confirm_settlement(&self, _investor: &InvestorRef, request_id: RequestId) -> Result<(), TransportError> {
        self.0.record(SimRequest::ConfirmSettlement(request_id));
        self.0
            .post_trading(move |cb| cb.on_settlement_confirm(None, request_id))
    }

    fn query_instruments(&self, request_id: RequestId) -> Result<(), TransportError> {
        self.0.record(SimRequest::QueryInstruments(request_id));
        let records = self.0.script.lock().instruments.clone();
        self.0.answer_fragments(request_id, records, |cb, data, id, last| {
            cb.on_instrument(data, None, id, last)
        })
    }

    fn query_commission_rate(
        &self,
        query: &CommissionRateQuery,
        request_id: RequestId,
    ) -> Result<(), TransportError> {
        self.0.record(SimRequest::QueryCommission {
            request_id,
            instrument_id: query.instrument_id.clone(),
        });
        let underlying = symbology::underlying_symbol(&query.instrument_id);
        let records: Vec<_> = self
            .0
            .script
            .lock()
            .commission_rates
            .iter()
            .filter(|r| symbology::underlying_symbol(&r.instrument_id) == underlying)
            .cloned()
            .collect();
        self.0.answer_fragments(request_id, records, |cb, data, id, last| {
            cb.on_commission_rate(data, None, id, last)
        })
    }

    fn query_positions(&self, _investor: &InvestorRef, request_id: RequestId) -> Result<(), TransportError> {
        self.0.record(SimRequest::QueryPositions(request_id));
        let records = self.0.script.lock().positions.clone();
        self.0.answer_fragments(request_id, records, |cb, data, id, last| {
            cb.on_position(data, None, id, last)
        })
    }

    fn query_orders(&self, _investor: &InvestorRef, request_id: RequestId) -> Result<(), TransportError> {
        self.0.record(SimRequest::QueryOrders(request_id));
        let records = self.0.script.lock().orders.clone();
        self.0.answer_fragments(request_id, records, |cb, data, id, last| {
            cb.on_order_query(data, None, id, last)
        })
    }

    fn query_account(&self, _investor: &InvestorRef, request_id: RequestId) -> Result<(), TransportError> {
        self.0.record(SimRequest::QueryAccount(request_id));
        let records: Vec<_> = self.0.script.lock().account.clone().into_iter().collect();
        self.0.answer_fragments(request_id, records, |cb, data, id, last| {
            cb.on_account(data, None, id, last)
        })
    }

    fn insert_order(&self, request: &OrderInsertRequest, request_id: RequestId) -> Result<(), TransportError> {
        self.0.record(SimRequest::InsertOrder {
            request_id,
            order_ref: request.order_ref.clone(),
        });
        let (reject, fill) = {
            let script = self.0.script.lock();
            (script.reject_orders.clone(), script.fill_orders)
        };
        let submitted = SimVenue::submitted_order(request);

        if let Some(error) = reject {
            return self.0.post_trading(move |cb| {
                cb.on_order_insert_rejected(Some(submitted), error, request_id)
            });
        }

        let working = RawOrder {
            order_status: Some(flags::STATUS_NO_TRADE_QUEUEING),
            ..submitted
        };
        let accepted = working.clone();
        self.0.post_trading(move |cb| cb.on_order(accepted))?;

        if fill && request.order_type == OrderType::Limit {
            let trade = RawTrade {
                instrument_id: working.instrument_id.clone(),
                exchange_id: working.exchange_id.clone(),
                order_ref: working.order_ref.clone(),
                trade_id: self.0.next_trade_id.fetch_add(1, Ordering::Relaxed).to_string(),
                direction: working.direction,
                offset_flag: working.comb_offset_flag,
                volume: working.volume_total_original,
                price: working.limit_price,
                trading_day: self.0.script.lock().trading_day.clone(),
                trade_time: "09:30:00".to_string(),
            };
            let filled = RawOrder {
                order_status: Some(flags::STATUS_ALL_TRADED),
                volume_traded: working.volume_total_original,
                ..working
            };
            self.0.post_trading(move |cb| {
                cb.on_trade(trade);
                cb.on_order(filled);
            })?;
        } else {
            self.0
                .working_orders
                .lock()
                .insert(working.order_ref.clone(), working);
        }
        Ok(())
    }

    fn cancel_order(&self, request: &OrderCancelRequest, request_id: RequestId) -> Result<(), TransportError> {
        self.0.record(SimRequest::CancelOrder {
            request_id,
            order_ref: request.order_ref.clone(),
            front_id: request.front_id,
            session_id: request.session_id,
        });
        if let Some(error) = self.0.script.lock().reject_cancels.clone() {
            return self
                .0
                .post_trading(move |cb| cb.on_order_cancel_rejected(error, request_id));
        }
        match self.0.working_orders.lock().remove(&request.order_ref) {
            Some(order) => {
                let cancelled = RawOrder {
                    order_status: Some(flags::STATUS_CANCELED),
                    ..order
                };
                self.0.post_trading(move |cb| cb.on_order(cancelled))
            }
            None => {
                let error = VenueErrorInfo::new(ORDER_NOT_FOUND, "order not found");
                self.0
                    .post_trading(move |cb| cb.on_order_cancel_rejected(error, request_id))
            }
        }
    }
}

impl SessionTransport for SimMarketDataTransport {
    fn disconnect(&self) -> Result<(), TransportError> {
        self.0.close(Channel::MarketData);
        Ok(())
    }

    fn authenticate(&self, _request: &AuthenticateRequest, request_id: RequestId) -> Result<(), TransportError> {
        self.0.answer_authenticate(Channel::MarketData, request_id)
    }

    fn login(&self, _request: &LoginRequest, request_id: RequestId) -> Result<(), TransportError> {
        self.0.answer_login(Channel::MarketData, request_id)
    }
}

impl MarketDataTransport for SimMarketDataTransport {
    fn connect(
        &self,
        address: &str,
        scratch_dir: &Path,
        callbacks: Arc<dyn MarketDataCallbacks>,
    ) -> Result<(), TransportError> {
        let delay = self.0.open(Channel::MarketData, address, scratch_dir)?;
        *self.0.market_data.lock() = Some(Link {
            callbacks,
            mailbox: spawn_mailbox(delay),
        });
        self.0.post_market_data(|cb| cb.on_connected())
    }

    fn subscribe(&self, instrument_ids: &[String]) -> Result<(), TransportError> {
        self.0.record(SimRequest::Subscribe(instrument_ids.to_vec()));
        self.0
            .subscriptions
            .lock()
            .extend(instrument_ids.iter().cloned());
        for id in instrument_ids {
            let id = id.clone();
            self.0.post_market_data(move |cb| cb.on_subscribe(id, None))?;
        }
        Ok(())
    }
}
