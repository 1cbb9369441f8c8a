//! Trading account snapshot.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub account_id: String,
    pub pre_balance: Decimal,
    pub balance: Decimal,
    pub available: Decimal,
    pub margin: Decimal,
    pub frozen_margin: Decimal,
    pub commission: Decimal,
    pub close_profit: Decimal,
    pub position_profit: Decimal,
}
