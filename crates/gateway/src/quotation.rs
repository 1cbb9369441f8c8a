//! Market-data proxy: subscriptions, last-quotation cache and tick forwarding.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use auth::VenueCredentials;
use common::{LinearBackoff, RequestId, RequestIdSequence};
use connector_core::decode::decode_tick;
use connector_core::{
    check_error, dispatch_session_request, MarketDataCallbacks, MarketDataTransport,
    RawDepthMarketData, RawLogin, SessionCallbacks, SessionMachine, SessionRequest,
    TransportError, VenueErrorInfo,
};
use dashmap::DashMap;
use execution_core::VenueRejection;
use metrics::SharedMetrics;
use model::Quotation;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, trace, warn};

use crate::config::GatewayConfig;
use crate::engine::StrategyEngine;
use crate::error::GatewayError;
use crate::retry::connect_with_retry;
use crate::trading::SharedInstrumentCache;

pub(crate) struct MarketDataHandler {
    session: Arc<SessionMachine>,
    transport: Arc<dyn MarketDataTransport>,
    credentials: VenueCredentials,
    /// Order book ids whose ticks reach the engine.
    universe: RwLock<HashSet<String>>,
    quotations: DashMap<String, Quotation>,
    /// Venue ids subscribed so far, replayed after a re-login.
    subscribed: Mutex<Vec<String>>,
    engine: Arc<dyn StrategyEngine>,
    metrics: SharedMetrics,
}

impl MarketDataHandler {
    fn send_session_request(&self, request: SessionRequest) {
        self.metrics.inc_login_attempts();
        if let Err(e) = dispatch_session_request(self.transport.as_ref(), &self.credentials, request) {
            warn!(?request, error = %e, "Session request could not be sent");
        }
    }

    fn subscribe(&self, instrument_ids: Vec<String>) -> Result<(), TransportError> {
        if instrument_ids.is_empty() {
            return Ok(());
        }
        self.transport.subscribe(&instrument_ids)?;
        info!(count = instrument_ids.len(), "Subscribed to market data");
        *self.subscribed.lock() = instrument_ids;
        Ok(())
    }

    fn resubscribe(&self) {
        let ids = self.subscribed.lock().clone();
        if ids.is_empty() {
            return;
        }
        match self.transport.subscribe(&ids) {
            Ok(()) => info!(count = ids.len(), "Market data re-subscribed"),
            Err(e) => warn!(error = %e, "Market data re-subscription failed"),
        }
    }
}

impl SessionCallbacks for MarketDataHandler {
    fn on_connected(&self) {
        info!("Market-data channel connected");
        let request = self.session.on_transport_connected();
        self.send_session_request(request);
    }

    fn on_disconnected(&self, reason: i32) {
        warn!(reason, "Market-data channel disconnected");
        self.metrics.inc_disconnects();
        self.session.on_disconnected();
    }

    fn on_heartbeat_warning(&self, lapse_secs: i32) {
        warn!(lapse_secs, "Market-data channel heartbeat overdue");
    }

    fn on_error(&self, info: VenueErrorInfo, request_id: RequestId) {
        if !info.is_error() {
            return;
        }
        self.metrics.inc_venue_errors();
        self.session.on_error(info.to_rejection());
        error!(request_id, code = info.error_id, message = %info.error_msg, "Market-data venue error");
        self.engine.on_error(info.error_id, &info.error_msg);
    }

    fn on_authenticate(&self, error: Option<VenueErrorInfo>, _request_id: RequestId) {
        if let Some(request) = self.session.on_authenticated(check_error(error.as_ref())) {
            self.send_session_request(request);
        }
    }

    fn on_login(&self, login: Option<RawLogin>, error: Option<VenueErrorInfo>, _request_id: RequestId) {
        let result = check_error(error.as_ref()).and_then(|()| {
            login
                .map(|l| (l.front_id, l.session_id))
                .ok_or_else(|| VenueRejection::new(-1, "empty login response"))
        });
        if self.session.on_logged_in(result) {
            self.resubscribe();
        }
    }

    fn on_logout(&self, error: Option<VenueErrorInfo>, _request_id: RequestId) {
        self.session.on_logged_out(check_error(error.as_ref()));
    }
}

impl MarketDataCallbacks for MarketDataHandler {
    fn on_subscribe(&self, instrument_id: String, error: Option<VenueErrorInfo>) {
        match check_error(error.as_ref()) {
            Ok(()) => trace!(%instrument_id, "Subscription confirmed"),
            Err(rejection) => {
                warn!(%instrument_id, code = rejection.code, message = %rejection.message, "Subscription rejected")
            }
        }
    }

    fn on_market_data(&self, data: RawDepthMarketData) {
        let tick = match decode_tick(&data) {
            Ok(tick) => tick,
            Err(e) => {
                self.metrics.inc_decode_drops();
                debug!(instrument_id = %data.instrument_id, error = %e, "Dropping invalid market data");
                return;
            }
        };

        self.metrics.inc_ticks_received();
        self.quotations
            .insert(tick.order_book_id.clone(), tick.quotation());

        if self.universe.read().contains(&tick.order_book_id) {
            self.metrics.inc_ticks_forwarded();
            self.engine.on_tick(tick);
        }
    }
}

pub struct QuotationProxy {
    address: String,
    scratch_dir: PathBuf,
    credentials: VenueCredentials,
    backoff: LinearBackoff,
    transport: Arc<dyn MarketDataTransport>,
    session: Arc<SessionMachine>,
    handler: Arc<MarketDataHandler>,
    instruments: SharedInstrumentCache,
    metrics: SharedMetrics,
}

impl QuotationProxy {
    pub fn new(
        config: &GatewayConfig,
        credentials: VenueCredentials,
        transport: Arc<dyn MarketDataTransport>,
        instruments: SharedInstrumentCache,
        engine: Arc<dyn StrategyEngine>,
        metrics: SharedMetrics,
    ) -> Self {
        let session = Arc::new(SessionMachine::new(
            config.venue.require_authentication,
            Arc::new(RequestIdSequence::new()),
        ));
        let handler = Arc::new(MarketDataHandler {
            session: session.clone(),
            transport: transport.clone(),
            credentials: credentials.clone(),
            universe: RwLock::new(HashSet::new()),
            quotations: DashMap::new(),
            subscribed: Mutex::new(Vec::new()),
            engine,
            metrics: metrics.clone(),
        });

        Self {
            address: config.venue.market_data_address.clone(),
            scratch_dir: config.market_data_scratch_dir(),
            credentials,
            backoff: config.backoff(),
            transport,
            session,
            handler,
            instruments,
            metrics,
        }
    }

    pub fn session(&self) -> &SessionMachine {
        &self.session
    }

    /// Connect and log in, then subscribe every instrument in the cache.
    pub async fn start(&self) -> Result<(), GatewayError> {
        std::fs::create_dir_all(&self.scratch_dir)?;

        let callbacks: Arc<dyn MarketDataCallbacks> = self.handler.clone();
        connect_with_retry(
            "market_data",
            &self.session,
            &self.backoff,
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

        let mut ids: Vec<String> = self
            .instruments
            .read()
            .values()
            .map(|i| i.venue_instrument_id.clone())
            .collect();
        ids.sort();
        self.handler.subscribe(ids)?;
        info!("Quotation proxy started");
        Ok(())
    }

    pub fn stop(&self) -> Result<(), GatewayError> {
        info!("Stopping quotation proxy");
        self.session.on_disconnected();
        self.transport.disconnect()?;
        Ok(())
    }

    /// Replace the set of order book ids whose ticks are forwarded.
    ///
    /// Subscriptions are unaffected; quotations keep updating for every
    /// subscribed instrument.
    pub fn update_universe<I, S>(&self, order_book_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let universe: HashSet<String> = order_book_ids.into_iter().map(Into::into).collect();
        debug!(size = universe.len(), "Universe updated");
        *self.handler.universe.write() = universe;
    }

    pub fn get_last_quotation(&self, order_book_id: &str) -> Option<Quotation> {
        self.handler.quotations.get(order_book_id).map(|q| *q)
    }
}
