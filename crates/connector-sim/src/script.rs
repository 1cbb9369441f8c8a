//! What the simulated venue answers.

use std::time::Duration;

use connector_core::raw::flags;
use connector_core::{
    RawAccount, RawCommissionRate, RawInstrument, RawOrder, RawPosition, VenueErrorInfo,
};

/// How the venue answers an authenticate or login request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionBehaviour {
    Accept,
    Reject(VenueErrorInfo),
    /// Never answer.
    Silent,
}

#[derive(Debug, Clone)]
pub struct SimScript {
    pub authenticate: SessionBehaviour,
    pub login: SessionBehaviour,
    pub front_id: i32,
    pub session_id: i32,
    pub trading_day: String,

    pub instruments: Vec<RawInstrument>,
    pub commission_rates: Vec<RawCommissionRate>,
    pub positions: Vec<RawPosition>,
    pub orders: Vec<RawOrder>,
    pub account: Option<RawAccount>,

    /// Terminate query answers with an extra empty fragment flagged last,
    /// instead of flagging the last record.
    pub trailing_empty_fragment: bool,
    /// Number of upcoming queries to leave unanswered.
    pub unanswered_queries: u32,
    /// Delay before each callback is delivered.
    pub response_delay: Duration,

    /// Reject every order insert with this error.
    pub reject_orders: Option<VenueErrorInfo>,
    /// Reject every cancel with this error.
    pub reject_cancels: Option<VenueErrorInfo>,
    /// Fill accepted orders in full at their limit price.
    pub fill_orders: bool,
    /// Refuse to open the channel.
    pub refuse_connect: bool,
}

impl Default for SimScript {
    fn default() -> Self {
        Self {
            authenticate: SessionBehaviour::Accept,
            login: SessionBehaviour::Accept,
            front_id: 1,
            session_id: 1,
            trading_day: "20170301".to_string(),
            instruments: Vec::new(),
            commission_rates: Vec::new(),
            positions: Vec::new(),
            orders: Vec::new(),
            account: None,
            trailing_empty_fragment: false,
            unanswered_queries: 0,
            response_delay: Duration::ZERO,
            reject_orders: None,
            reject_cancels: None,
            fill_orders: false,
            refuse_connect: false,
        }
    }
}

pub fn instrument(instrument_id: &str, exchange_id: &str, multiple: i64) -> RawInstrument {
    RawInstrument {
        instrument_id: instrument_id.to_string(),
        exchange_id: exchange_id.to_string(),
        volume_multiple: multiple,
        long_margin_ratio: 0.125,
        short_margin_ratio: 0.125,
    }
}

pub fn commission_by_money(product: &str, open: f64, close: f64, close_today: f64) -> RawCommissionRate {
    RawCommissionRate {
        instrument_id: product.to_string(),
        open_ratio_by_money: open,
        close_ratio_by_money: close,
        close_today_ratio_by_money: close_today,
        ..Default::default()
    }
}

impl SimScript {
    /// A small futures book for dry runs.
    pub fn demo() -> Self {
        Self {
            instruments: vec![
                instrument("rb1705", "SHFE", 10),
                instrument("rb1710", "SHFE", 10),
                instrument("cu1705", "SHFE", 5),
                instrument("SR705", "CZCE", 10),
                instrument("m1707-C-2600", "DCE", 10),
            ],
            commission_rates: vec![
                commission_by_money("rb", 0.0001, 0.0001, 0.0001),
                commission_by_money("cu", 0.00005, 0.00005, 0.0),
                RawCommissionRate {
                    instrument_id: "SR".to_string(),
                    close_ratio_by_money: 0.0001,
                    open_ratio_by_volume: 3.0,
                    close_ratio_by_volume: 3.0,
                    close_today_ratio_by_volume: 0.0,
                    ..Default::default()
                },
            ],
            positions: vec![
                RawPosition {
                    instrument_id: "rb1705".to_string(),
                    posi_direction: flags::POSITION_LONG,
                    yd_position: 2,
                    position: 2,
                    open_cost: 68000.0,
                    pre_settlement_price: 3405.0,
                    ..Default::default()
                },
                RawPosition {
                    instrument_id: "rb1705".to_string(),
                    posi_direction: flags::POSITION_LONG,
                    today_position: 1,
                    position: 1,
                    open_cost: 34120.0,
                    commission: 3.5,
                    pre_settlement_price: 3405.0,
                    ..Default::default()
                },
            ],
            account: Some(RawAccount {
                account_id: "sim".to_string(),
                pre_balance: 1_000_000.0,
                balance: 1_000_000.0,
                available: 900_000.0,
                curr_margin: 100_000.0,
                ..Default::default()
            }),
            fill_orders: true,
            ..Default::default()
        }
    }
}
