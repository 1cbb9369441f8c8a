//! Mapping of raw venue records onto domain records.
//!
//! Each function returns:
//! - `Ok(Some(record))` for a usable record
//! - `Ok(None)` for a record that is well-formed but not applicable
//!   (empty row, non-futures instrument, order status we do not track)
//! - `Err(DecodeError)` for a record failing validation
//!
//! Both `None` and errors are dropped by the callers; neither reaches an
//! aggregate.

use execution_core::{
    Account, Order, OrderSide, OrderStatus, PositionEffect, PositionSide, PositionSnapshot, Trade,
};
use model::{
    symbology, BookLevel, CommissionRate, CommissionRatios, InstrumentSnapshot, MarginType, Tick,
    BOOK_DEPTH,
};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use crate::error::DecodeError;
use crate::raw::{
    flags, RawAccount, RawCommissionRate, RawDepthMarketData, RawInstrument, RawOrder,
    RawPosition, RawTrade,
};

/// Exchange that distinguishes closing today's position from older ones.
const CLOSE_TODAY_EXCHANGE: &str = "SHFE";

/// Convert a venue price, rejecting the empty sentinel and non-finite values.
fn decimal(field: &'static str, value: f64) -> Result<Decimal, DecodeError> {
    if !value.is_finite() || value == f64::MAX {
        return Err(DecodeError::invalid(field, value));
    }
    Decimal::from_f64(value).ok_or_else(|| DecodeError::invalid(field, value))
}

/// Like [`decimal`], but an empty value reads as zero.
fn decimal_or_zero(value: f64) -> Decimal {
    decimal("", value).unwrap_or(Decimal::ZERO)
}

fn order_book_id(venue_id: &str) -> Result<String, DecodeError> {
    symbology::order_book_id(venue_id).ok_or_else(|| DecodeError::invalid("instrument_id", venue_id))
}

fn side(direction: char) -> Result<OrderSide, DecodeError> {
    match direction {
        flags::DIRECTION_BUY => Ok(OrderSide::Buy),
        flags::DIRECTION_SELL => Ok(OrderSide::Sell),
        other => Err(DecodeError::invalid("direction", other)),
    }
}

fn position_effect(exchange_id: &str, offset_flag: char) -> PositionEffect {
    match offset_flag {
        flags::OFFSET_OPEN => PositionEffect::Open,
        flags::OFFSET_CLOSE_TODAY if exchange_id == CLOSE_TODAY_EXCHANGE => {
            PositionEffect::CloseToday
        }
        _ => PositionEffect::Close,
    }
}

fn order_id(order_ref: &str) -> Result<i64, DecodeError> {
    order_ref
        .trim()
        .parse()
        .map_err(|_| DecodeError::invalid("order_ref", order_ref))
}

fn yyyymmdd(field: &'static str, value: &str) -> Result<u32, DecodeError> {
    if value.len() != 8 {
        return Err(DecodeError::invalid(field, value));
    }
    value.parse().map_err(|_| DecodeError::invalid(field, value))
}

/// Parse `HH:MM:SS` into `HHMMSS`.
fn hhmmss(field: &'static str, value: &str) -> Result<u32, DecodeError> {
    let invalid = || DecodeError::invalid(field, value);
    let mut parts = value.split(':');
    let mut component = |limit: u32| -> Result<u32, DecodeError> {
        let part = parts.next().ok_or_else(invalid)?;
        if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let n: u32 = part.parse().map_err(|_| invalid())?;
        if n < limit {
            Ok(n)
        } else {
            Err(invalid())
        }
    };
    let hours = component(24)?;
    let minutes = component(60)?;
    let seconds = component(60)?;
    if parts.next().is_some() {
        return Err(invalid());
    }
    Ok(hours * 10_000 + minutes * 100 + seconds)
}

pub fn decode_instrument(raw: &RawInstrument) -> Result<Option<InstrumentSnapshot>, DecodeError> {
    if !symbology::is_future(&raw.instrument_id) {
        return Ok(None);
    }
    Ok(Some(InstrumentSnapshot {
        order_book_id: order_book_id(&raw.instrument_id)?,
        venue_instrument_id: raw.instrument_id.clone(),
        underlying_symbol: symbology::underlying_symbol(&raw.instrument_id),
        exchange_id: raw.exchange_id.clone(),
        contract_multiplier: Decimal::from(raw.volume_multiple),
        long_margin_ratio: decimal("long_margin_ratio", raw.long_margin_ratio)?,
        short_margin_ratio: decimal("short_margin_ratio", raw.short_margin_ratio)?,
        margin_type: MarginType::ByMoney,
        open_commission_ratio: Decimal::ZERO,
        close_commission_ratio: Decimal::ZERO,
        close_today_commission_ratio: Decimal::ZERO,
        commission_type: None,
        commission_valid: false,
    }))
}

pub fn decode_commission(raw: &RawCommissionRate) -> Result<CommissionRate, DecodeError> {
    if raw.instrument_id.is_empty() {
        return Err(DecodeError::Missing("instrument_id"));
    }
    let by_money = CommissionRatios {
        open: decimal("open_ratio_by_money", raw.open_ratio_by_money)?,
        close: decimal("close_ratio_by_money", raw.close_ratio_by_money)?,
        close_today: decimal("close_today_ratio_by_money", raw.close_today_ratio_by_money)?,
    };
    let by_volume = CommissionRatios {
        open: decimal("open_ratio_by_volume", raw.open_ratio_by_volume)?,
        close: decimal("close_ratio_by_volume", raw.close_ratio_by_volume)?,
        close_today: decimal("close_today_ratio_by_volume", raw.close_today_ratio_by_volume)?,
    };
    Ok(CommissionRate::select(
        symbology::underlying_symbol(&raw.instrument_id),
        by_money,
        by_volume,
    ))
}

pub fn decode_position(raw: &RawPosition) -> Result<Option<PositionSnapshot>, DecodeError> {
    if raw.instrument_id.is_empty() {
        return Ok(None);
    }
    let direction = match raw.posi_direction {
        flags::POSITION_NET | flags::POSITION_LONG => OrderSide::Buy,
        flags::POSITION_SHORT => OrderSide::Sell,
        other => return Err(DecodeError::invalid("posi_direction", other)),
    };
    let row = PositionSide {
        old_quantity: raw.yd_position,
        today_quantity: raw.today_position,
        quantity: raw.position,
        transaction_cost: decimal("commission", raw.commission)?,
        realized_pnl: decimal("close_profit", raw.close_profit)?,
        open_cost: decimal("open_cost", raw.open_cost)?,
    };
    Ok(Some(PositionSnapshot::from_row(
        order_book_id(&raw.instrument_id)?,
        direction,
        row,
        decimal_or_zero(raw.pre_settlement_price),
    )))
}

/// Decode an order push or query row. `rejected` marks records taken from
/// an insert rejection, which carry no status of their own.
pub fn decode_order(raw: &RawOrder, rejected: bool) -> Result<Option<Order>, DecodeError> {
    if raw.instrument_id.is_empty() {
        return Ok(None);
    }
    let status = if rejected {
        OrderStatus::Rejected
    } else {
        match raw.order_status {
            Some(flags::STATUS_PART_TRADED_QUEUEING | flags::STATUS_NO_TRADE_QUEUEING) => {
                OrderStatus::Active
            }
            Some(flags::STATUS_ALL_TRADED) => OrderStatus::Filled,
            Some(flags::STATUS_CANCELED) => OrderStatus::Cancelled,
            Some(_) => return Ok(None),
            None => return Err(DecodeError::Missing("order_status")),
        }
    };
    Ok(Some(Order {
        order_id: order_id(&raw.order_ref)?,
        order_book_id: order_book_id(&raw.instrument_id)?,
        exchange_id: raw.exchange_id.clone(),
        side: side(raw.direction)?,
        position_effect: position_effect(&raw.exchange_id, raw.comb_offset_flag),
        quantity: raw.volume_total_original,
        filled_quantity: raw.volume_traded,
        price: decimal("limit_price", raw.limit_price)?,
        status,
        insert_time: raw.insert_time.clone().filter(|t| !t.is_empty()),
    }))
}

pub fn decode_trade(raw: &RawTrade) -> Result<Trade, DecodeError> {
    Ok(Trade {
        order_id: order_id(&raw.order_ref)?,
        trade_id: raw.trade_id.trim().to_string(),
        order_book_id: order_book_id(&raw.instrument_id)?,
        exchange_id: raw.exchange_id.clone(),
        side: side(raw.direction)?,
        position_effect: position_effect(&raw.exchange_id, raw.offset_flag),
        quantity: raw.volume,
        price: decimal("price", raw.price)?,
        trading_day: yyyymmdd("trading_day", &raw.trading_day)?,
        trade_time: raw.trade_time.clone(),
    })
}

/// Decode a depth market-data push.
///
/// The last price and the price limits are required. Session statistics
/// (open, high, low, closes, turnover) read as zero when the venue leaves
/// them empty, as it does before the first trade. Empty book levels read as
/// zero price and volume.
pub fn decode_tick(raw: &RawDepthMarketData) -> Result<Tick, DecodeError> {
    let time_of_day = hhmmss("update_time", &raw.update_time)?;
    if raw.update_millisec > 999 {
        return Err(DecodeError::invalid("update_millisec", raw.update_millisec));
    }

    let level = |price: f64, volume: i64| match decimal("", price) {
        Ok(price) => BookLevel { price, volume },
        Err(_) => BookLevel::default(),
    };
    let bids: [BookLevel; BOOK_DEPTH] =
        std::array::from_fn(|i| level(raw.bid_prices[i], raw.bid_volumes[i]));
    let asks: [BookLevel; BOOK_DEPTH] =
        std::array::from_fn(|i| level(raw.ask_prices[i], raw.ask_volumes[i]));

    Ok(Tick {
        order_book_id: order_book_id(&raw.instrument_id)?,
        trading_day: yyyymmdd("trading_day", &raw.trading_day)?,
        time: time_of_day * 1000 + raw.update_millisec,
        open: decimal_or_zero(raw.open_price),
        last: decimal("last_price", raw.last_price)?,
        high: decimal_or_zero(raw.highest_price),
        low: decimal_or_zero(raw.lowest_price),
        prev_close: decimal_or_zero(raw.pre_close_price),
        prev_settlement: decimal_or_zero(raw.pre_settlement_price),
        volume: raw.volume,
        total_turnover: decimal_or_zero(raw.turnover),
        open_interest: decimal_or_zero(raw.open_interest),
        limit_up: decimal("upper_limit_price", raw.upper_limit_price)?,
        limit_down: decimal("lower_limit_price", raw.lower_limit_price)?,
        bids,
        asks,
    })
}

pub fn decode_account(raw: &RawAccount) -> Result<Account, DecodeError> {
    Ok(Account {
        account_id: raw.account_id.clone(),
        pre_balance: decimal("pre_balance", raw.pre_balance)?,
        balance: decimal("balance", raw.balance)?,
        available: decimal("available", raw.available)?,
        margin: decimal("curr_margin", raw.curr_margin)?,
        frozen_margin: decimal("frozen_margin", raw.frozen_margin)?,
        commission: decimal("commission", raw.commission)?,
        close_profit: decimal("close_profit", raw.close_profit)?,
        position_profit: decimal("position_profit", raw.position_profit)?,
    })
}
