//! Outgoing venue requests.

use auth::VenueCredentials;
use execution_core::{OrderRequest, OrderSide, OrderType, PositionEffect};
use model::InstrumentSnapshot;
use rust_decimal::Decimal;
use secrecy::SecretString;

#[derive(Debug)]
pub struct LoginRequest {
    pub broker_id: String,
    pub user_id: String,
    pub password: SecretString,
}

impl LoginRequest {
    pub fn from_credentials(credentials: &VenueCredentials) -> Self {
        Self {
            broker_id: credentials.broker_id().to_string(),
            user_id: credentials.user_id().to_string(),
            password: SecretString::from(credentials.expose_password().to_string()),
        }
    }
}

#[derive(Debug)]
pub struct AuthenticateRequest {
    pub broker_id: String,
    pub user_id: String,
    pub auth_code: Option<SecretString>,
    pub product_info: Option<String>,
}

impl AuthenticateRequest {
    pub fn from_credentials(credentials: &VenueCredentials) -> Self {
        Self {
            broker_id: credentials.broker_id().to_string(),
            user_id: credentials.user_id().to_string(),
            auth_code: credentials
                .expose_auth_code()
                .map(|code| SecretString::from(code.to_string())),
            product_info: credentials.product_info().map(str::to_string),
        }
    }
}

/// Identifies the investor for account-scoped requests
/// (positions, orders, account, settlement confirmation).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvestorRef {
    pub broker_id: String,
    pub investor_id: String,
}

impl InvestorRef {
    pub fn from_credentials(credentials: &VenueCredentials) -> Self {
        Self {
            broker_id: credentials.broker_id().to_string(),
            investor_id: credentials.user_id().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommissionRateQuery {
    pub investor: InvestorRef,
    pub instrument_id: String,
    pub exchange_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderInsertRequest {
    pub investor: InvestorRef,
    pub instrument_id: String,
    pub exchange_id: String,
    /// Engine order id, echoed back in every push for this order.
    pub order_ref: String,
    pub side: OrderSide,
    pub position_effect: PositionEffect,
    pub order_type: OrderType,
    pub limit_price: Decimal,
    pub volume: i64,
}

impl OrderInsertRequest {
    pub fn new(investor: InvestorRef, order: &OrderRequest, instrument: &InstrumentSnapshot) -> Self {
        Self {
            investor,
            instrument_id: instrument.venue_instrument_id.clone(),
            exchange_id: instrument.exchange_id.clone(),
            order_ref: order.order_id.to_string(),
            side: order.side,
            position_effect: order.position_effect,
            order_type: order.order_type,
            limit_price: order.price,
            volume: order.quantity,
        }
    }
}

/// Delete request for a working order. Orders are identified by the
/// front/session pair of the login that placed them plus the order ref.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderCancelRequest {
    pub investor: InvestorRef,
    pub instrument_id: String,
    pub exchange_id: String,
    pub order_ref: String,
    pub front_id: i32,
    pub session_id: i32,
}
