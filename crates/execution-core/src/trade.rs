//! Trade (fill) records pushed by the venue.

use crate::order::{OrderSide, PositionEffect};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single fill of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Engine order id the fill belongs to.
    pub order_id: i64,
    /// Venue-assigned trade id.
    pub trade_id: String,
    pub order_book_id: String,
    pub exchange_id: String,
    pub side: OrderSide,
    pub position_effect: PositionEffect,
    pub quantity: i64,
    pub price: Decimal,
    /// Trading day as `YYYYMMDD`.
    pub trading_day: u32,
    /// Trade time, `HH:MM:SS`.
    pub trade_time: String,
}

impl Trade {
    pub fn notional(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}
