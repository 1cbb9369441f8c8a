//! Position snapshots aggregated from position-query rows.
//!
//! The venue reports one row per instrument, direction and settlement bucket
//! (yesterday/today), so a single instrument arrives as several fragments.
//! Rows are folded into a snapshot by adding each side's figures.

use crate::order::OrderSide;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Quantities and costs for one direction of a position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionSide {
    /// Quantity carried over from previous sessions.
    pub old_quantity: i64,
    /// Quantity opened today.
    pub today_quantity: i64,
    /// Total quantity held.
    pub quantity: i64,
    pub transaction_cost: Decimal,
    pub realized_pnl: Decimal,
    pub open_cost: Decimal,
}

impl PositionSide {
    fn absorb(&mut self, other: &PositionSide) {
        self.old_quantity += other.old_quantity;
        self.today_quantity += other.today_quantity;
        self.quantity += other.quantity;
        self.transaction_cost += other.transaction_cost;
        self.realized_pnl += other.realized_pnl;
        self.open_cost += other.open_cost;
    }

    pub fn is_flat(&self) -> bool {
        self.quantity == 0
    }
}

/// Position in one instrument, both directions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub order_book_id: String,
    pub buy: PositionSide,
    pub sell: PositionSide,
    pub prev_settle_price: Decimal,
}

impl PositionSnapshot {
    /// Create an empty position.
    pub fn new(order_book_id: impl Into<String>) -> Self {
        Self {
            order_book_id: order_book_id.into(),
            buy: PositionSide::default(),
            sell: PositionSide::default(),
            prev_settle_price: Decimal::ZERO,
        }
    }

    /// A snapshot holding a single direction row.
    pub fn from_row(
        order_book_id: impl Into<String>,
        side: OrderSide,
        row: PositionSide,
        prev_settle_price: Decimal,
    ) -> Self {
        let mut snapshot = Self::new(order_book_id);
        match side {
            OrderSide::Buy => snapshot.buy = row,
            OrderSide::Sell => snapshot.sell = row,
        }
        snapshot.prev_settle_price = prev_settle_price;
        snapshot
    }

    /// Fold another fragment for the same instrument into this one.
    ///
    /// Side figures are summed. The previous settlement price is taken from the
    /// later fragment unless that fragment does not carry one.
    pub fn absorb(&mut self, other: &PositionSnapshot) {
        debug_assert_eq!(self.order_book_id, other.order_book_id);
        self.buy.absorb(&other.buy);
        self.sell.absorb(&other.sell);
        if !other.prev_settle_price.is_zero() {
            self.prev_settle_price = other.prev_settle_price;
        }
    }

    /// Net quantity (positive = long, negative = short).
    pub fn net_quantity(&self) -> i64 {
        self.buy.quantity - self.sell.quantity
    }

    /// Check if position is flat (no holdings on either side).
    pub fn is_flat(&self) -> bool {
        self.buy.is_flat() && self.sell.is_flat()
    }
}
