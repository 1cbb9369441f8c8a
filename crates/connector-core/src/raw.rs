//! Records as delivered by the venue API, before decoding.
//!
//! Field names follow the venue's structures. Numeric prices are `f64` and
//! the venue marks an absent price with `f64::MAX`; enumerations are single
//! character codes (see [`flags`]).

use execution_core::VenueRejection;
use serde::{Deserialize, Serialize};

/// Character codes used by the venue for enumerated fields.
pub mod flags {
    pub const DIRECTION_BUY: char = '0';
    pub const DIRECTION_SELL: char = '1';

    pub const OFFSET_OPEN: char = '0';
    pub const OFFSET_CLOSE: char = '1';
    pub const OFFSET_FORCE_CLOSE: char = '2';
    pub const OFFSET_CLOSE_TODAY: char = '3';
    pub const OFFSET_CLOSE_YESTERDAY: char = '4';

    pub const STATUS_ALL_TRADED: char = '0';
    pub const STATUS_PART_TRADED_QUEUEING: char = '1';
    pub const STATUS_PART_TRADED_NOT_QUEUEING: char = '2';
    pub const STATUS_NO_TRADE_QUEUEING: char = '3';
    pub const STATUS_NO_TRADE_NOT_QUEUEING: char = '4';
    pub const STATUS_CANCELED: char = '5';
    pub const STATUS_UNKNOWN: char = 'a';

    pub const POSITION_NET: char = '1';
    pub const POSITION_LONG: char = '2';
    pub const POSITION_SHORT: char = '3';

    pub const PRICE_TYPE_ANY: char = '1';
    pub const PRICE_TYPE_LIMIT: char = '2';
}

/// Error info attached to a response. Code 0 means success.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenueErrorInfo {
    pub error_id: i32,
    pub error_msg: String,
}

impl VenueErrorInfo {
    pub fn new(error_id: i32, error_msg: impl Into<String>) -> Self {
        Self {
            error_id,
            error_msg: error_msg.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error_id != 0
    }

    pub fn to_rejection(&self) -> VenueRejection {
        VenueRejection::new(self.error_id, self.error_msg.clone())
    }
}

/// Turn the optional error info of a response into a result.
pub fn check_error(error: Option<&VenueErrorInfo>) -> Result<(), VenueRejection> {
    match error {
        Some(info) if info.is_error() => Err(info.to_rejection()),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawLogin {
    pub front_id: i32,
    pub session_id: i32,
    pub trading_day: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawInstrument {
    pub instrument_id: String,
    pub exchange_id: String,
    pub volume_multiple: i64,
    pub long_margin_ratio: f64,
    pub short_margin_ratio: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCommissionRate {
    /// Product code or contract id the rate was quoted for.
    pub instrument_id: String,
    pub open_ratio_by_money: f64,
    pub open_ratio_by_volume: f64,
    pub close_ratio_by_money: f64,
    pub close_ratio_by_volume: f64,
    pub close_today_ratio_by_money: f64,
    pub close_today_ratio_by_volume: f64,
}

/// One position row: a single instrument, direction and settlement bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPosition {
    pub instrument_id: String,
    pub posi_direction: char,
    pub yd_position: i64,
    pub today_position: i64,
    pub position: i64,
    pub commission: f64,
    pub close_profit: f64,
    pub open_cost: f64,
    pub pre_settlement_price: f64,
}

/// An order as reported by an order push, an order query, or an insert
/// rejection. Rejections carry the submitted fields only, so `order_status`
/// is absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawOrder {
    pub instrument_id: String,
    pub exchange_id: String,
    pub order_ref: String,
    pub direction: char,
    pub comb_offset_flag: char,
    pub order_status: Option<char>,
    pub volume_total_original: i64,
    pub volume_traded: i64,
    pub limit_price: f64,
    pub insert_time: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTrade {
    pub instrument_id: String,
    pub exchange_id: String,
    pub order_ref: String,
    pub trade_id: String,
    pub direction: char,
    pub offset_flag: char,
    pub volume: i64,
    pub price: f64,
    pub trading_day: String,
    pub trade_time: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDepthMarketData {
    pub instrument_id: String,
    pub trading_day: String,
    /// `HH:MM:SS`
    pub update_time: String,
    pub update_millisec: u32,
    pub open_price: f64,
    pub last_price: f64,
    pub highest_price: f64,
    pub lowest_price: f64,
    pub pre_close_price: f64,
    pub pre_settlement_price: f64,
    pub volume: i64,
    pub turnover: f64,
    pub open_interest: f64,
    pub upper_limit_price: f64,
    pub lower_limit_price: f64,
    pub bid_prices: [f64; 5],
    pub bid_volumes: [i64; 5],
    pub ask_prices: [f64; 5],
    pub ask_volumes: [i64; 5],
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawAccount {
    pub account_id: String,
    pub pre_balance: f64,
    pub balance: f64,
    pub available: f64,
    pub curr_margin: f64,
    pub frozen_margin: f64,
    pub commission: f64,
    pub close_profit: f64,
    pub position_profit: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_error_code_zero_is_ok() {
        assert!(check_error(None).is_ok());
        assert!(check_error(Some(&VenueErrorInfo::default())).is_ok());

        let err = check_error(Some(&VenueErrorInfo::new(3, "invalid login"))).unwrap_err();
        assert_eq!(err.code, 3);
        assert_eq!(err.message, "invalid login");
    }
}
