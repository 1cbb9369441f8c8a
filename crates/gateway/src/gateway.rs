use std::sync::Arc;

use auth::VenueCredentials;
use common::RequestId;
use connector_core::{MarketDataTransport, TradingTransport};
use execution_core::{Account, Collection, Order, OrderRequest, PositionSnapshot};
use metrics::{create_metrics, SharedMetrics};
use model::{InstrumentSnapshot, Quotation};
use tracing::{error, info};

use crate::config::GatewayConfig;
use crate::engine::StrategyEngine;
use crate::error::GatewayError;
use crate::quotation::QuotationProxy;
use crate::trading::TradingProxy;

/// Both venue channels behind one handle.
///
/// The trading side owns the instrument cache; the market-data side reads it
/// to decide what to subscribe.
pub struct Gateway {
    trading: TradingProxy,
    quotation: QuotationProxy,
    metrics: SharedMetrics,
}

impl Gateway {
    pub fn new(
        config: &GatewayConfig,
        credentials: VenueCredentials,
        trading_transport: Arc<dyn TradingTransport>,
        market_data_transport: Arc<dyn MarketDataTransport>,
        engine: Arc<dyn StrategyEngine>,
    ) -> Self {
        let metrics = create_metrics();
        let trading = TradingProxy::new(
            config,
            credentials.clone(),
            trading_transport,
            engine.clone(),
            metrics.clone(),
        );
        let quotation = QuotationProxy::new(
            config,
            credentials,
            market_data_transport,
            trading.instrument_cache(),
            engine,
            metrics.clone(),
        );
        Self {
            trading,
            quotation,
            metrics,
        }
    }

    /// Start trading, then market data. Any failure tears both down.
    pub async fn start(&self) -> Result<(), GatewayError> {
        let started = match self.trading.start().await {
            Ok(()) => self.quotation.start().await,
            Err(e) => Err(e),
        };
        if let Err(e) = started {
            error!(error = %e, "Gateway start failed");
            if let Err(stop_error) = self.stop() {
                error!(error = %stop_error, "Teardown after failed start also failed");
            }
            return Err(e);
        }
        info!("Gateway started");
        Ok(())
    }

    pub fn stop(&self) -> Result<(), GatewayError> {
        let quotation = self.quotation.stop();
        let trading = self.trading.stop();
        quotation.and(trading)
    }

    pub fn trading(&self) -> &TradingProxy {
        &self.trading
    }

    pub fn quotation(&self) -> &QuotationProxy {
        &self.quotation
    }

    pub fn metrics(&self) -> SharedMetrics {
        self.metrics.clone()
    }

    pub fn update_universe<I, S>(&self, order_book_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.quotation.update_universe(order_book_ids);
    }

    pub fn get_last_quotation(&self, order_book_id: &str) -> Option<Quotation> {
        self.quotation.get_last_quotation(order_book_id)
    }

    pub fn get_available_instruments(&self) -> Collection<InstrumentSnapshot> {
        self.trading.get_available_instruments()
    }

    pub fn get_instrument(&self, order_book_id: &str) -> Option<InstrumentSnapshot> {
        self.trading.get_instrument(order_book_id)
    }

    pub fn submit_order(&self, order: &OrderRequest) -> Result<RequestId, GatewayError> {
        self.trading.submit_order(order)
    }

    pub fn cancel_order(&self, order: &Order) -> Result<RequestId, GatewayError> {
        self.trading.cancel_order(order)
    }

    pub async fn get_positions(&self) -> Result<Collection<PositionSnapshot>, GatewayError> {
        self.trading.get_positions().await
    }

    pub async fn get_orders(&self) -> Result<Collection<Order>, GatewayError> {
        self.trading.get_orders().await
    }

    pub async fn get_account(&self) -> Result<Option<Account>, GatewayError> {
        self.trading.get_account().await
    }
}
