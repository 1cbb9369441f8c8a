//! Order types and status enums.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

/// Whether an order opens or closes a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionEffect {
    Open,
    Close,
    /// Close today's position; only distinguished by exchanges that track it.
    CloseToday,
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
}

/// Order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Working at the exchange, possibly partially traded.
    Active,
    /// Order completely filled.
    Filled,
    /// Order canceled.
    Cancelled,
    /// Order rejected by the broker or exchange.
    Rejected,
}

impl OrderStatus {
    /// Check if this is a terminal status (order is done).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Filled | Self::Cancelled | Self::Rejected)
    }
}

/// An order submission from the strategy engine.
///
/// `order_id` is assigned by the engine and travels to the venue as the order
/// reference, so pushes for the order can be matched back to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub order_id: i64,
    pub order_book_id: String,
    pub side: OrderSide,
    pub position_effect: PositionEffect,
    pub order_type: OrderType,
    pub quantity: i64,
    /// Limit price; ignored for market orders.
    pub price: Decimal,
}

impl OrderRequest {
    pub fn limit(
        order_id: i64,
        order_book_id: impl Into<String>,
        side: OrderSide,
        position_effect: PositionEffect,
        quantity: i64,
        price: Decimal,
    ) -> Self {
        Self {
            order_id,
            order_book_id: order_book_id.into(),
            side,
            position_effect,
            order_type: OrderType::Limit,
            quantity,
            price,
        }
    }
}

/// Point-in-time state of an order as reported by the venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: i64,
    pub order_book_id: String,
    pub exchange_id: String,
    pub side: OrderSide,
    pub position_effect: PositionEffect,
    pub quantity: i64,
    pub filled_quantity: i64,
    pub price: Decimal,
    pub status: OrderStatus,
    /// Venue insert time, `HH:MM:SS`, when reported.
    pub insert_time: Option<String>,
}

impl Order {
    /// Calculate remaining quantity to be filled.
    pub fn remaining_quantity(&self) -> i64 {
        self.quantity - self.filled_quantity
    }
}
