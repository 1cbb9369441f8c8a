use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Number of book levels carried by a depth market-data push.
pub const BOOK_DEPTH: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Decimal,
    pub volume: i64,
}

/// A depth market-data snapshot for one instrument.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub order_book_id: String,
    /// Trading day as `YYYYMMDD`.
    pub trading_day: u32,
    /// Update time as `HHMMSSmmm`.
    pub time: u32,
    pub open: Decimal,
    pub last: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub prev_close: Decimal,
    pub prev_settlement: Decimal,
    pub volume: i64,
    pub total_turnover: Decimal,
    pub open_interest: Decimal,
    pub limit_up: Decimal,
    pub limit_down: Decimal,
    pub bids: [BookLevel; BOOK_DEPTH],
    pub asks: [BookLevel; BOOK_DEPTH],
}

impl Tick {
    /// The subset of the tick kept in the last-quotation cache.
    pub fn quotation(&self) -> Quotation {
        Quotation {
            price: self.last,
            limit_up: self.limit_up,
            limit_down: self.limit_down,
        }
    }
}

/// Latest price and price limits of an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quotation {
    pub price: Decimal,
    pub limit_up: Decimal,
    pub limit_down: Decimal,
}
