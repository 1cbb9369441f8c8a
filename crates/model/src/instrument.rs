//! Instrument reference data and commission rates.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarginType {
    ByMoney,
    ByVolume,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommissionType {
    ByMoney,
    ByVolume,
}

/// Open/close/close-today ratios as quoted by the venue for one basis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionRatios {
    pub open: Decimal,
    pub close: Decimal,
    pub close_today: Decimal,
}

/// Commission rates for every contract of one underlying symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionRate {
    pub underlying_symbol: String,
    pub open_ratio: Decimal,
    pub close_ratio: Decimal,
    pub close_today_ratio: Decimal,
    /// `None` when the venue quotes both bases at once and the basis is ambiguous.
    pub commission_type: Option<CommissionType>,
}

impl CommissionRate {
    /// Pick the effective ratios from the by-money and by-volume quotes.
    ///
    /// By-volume ratios are used only when the by-money open ratio is zero and
    /// the by-money close ratio is not; every other combination (including both
    /// bases all-zero) falls back to by-money. The resulting type is `None`
    /// whenever the rejected basis also carries non-zero ratios, or when the
    /// chosen by-volume basis is all zero. This branching depends on how the
    /// venue populates its rate records and is kept as observed.
    pub fn select(
        underlying_symbol: impl Into<String>,
        by_money: CommissionRatios,
        by_volume: CommissionRatios,
    ) -> Self {
        let (ratios, commission_type) = if by_money.open.is_zero() && !by_money.close.is_zero() {
            let kind = if !by_volume.open.is_zero() || !by_volume.close.is_zero() {
                Some(CommissionType::ByVolume)
            } else {
                None
            };
            (by_volume, kind)
        } else {
            let kind = if by_volume.open.is_zero() && by_volume.close.is_zero() {
                Some(CommissionType::ByMoney)
            } else {
                None
            };
            (by_money, kind)
        };

        Self {
            underlying_symbol: underlying_symbol.into(),
            open_ratio: ratios.open,
            close_ratio: ratios.close,
            close_today_ratio: ratios.close_today,
            commission_type,
        }
    }
}

/// Reference data for one tradable contract.
///
/// Built from an instrument-definition fragment; commission fields are filled
/// later from a separate commission-rate query keyed by underlying symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentSnapshot {
    pub order_book_id: String,
    /// Id the venue expects in requests and subscriptions.
    pub venue_instrument_id: String,
    pub underlying_symbol: String,
    pub exchange_id: String,
    pub contract_multiplier: Decimal,
    pub long_margin_ratio: Decimal,
    pub short_margin_ratio: Decimal,
    pub margin_type: MarginType,
    pub open_commission_ratio: Decimal,
    pub close_commission_ratio: Decimal,
    pub close_today_commission_ratio: Decimal,
    pub commission_type: Option<CommissionType>,
    pub commission_valid: bool,
}

impl InstrumentSnapshot {
    /// Copy the rates onto this snapshot and mark its commission data valid.
    ///
    /// Applying the same rate again leaves the snapshot unchanged.
    pub fn apply_commission(&mut self, rate: &CommissionRate) {
        self.open_commission_ratio = rate.open_ratio;
        self.close_commission_ratio = rate.close_ratio;
        self.close_today_commission_ratio = rate.close_today_ratio;
        self.commission_type = rate.commission_type;
        self.commission_valid = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ratios(open: Decimal, close: Decimal, close_today: Decimal) -> CommissionRatios {
        CommissionRatios {
            open,
            close,
            close_today,
        }
    }

    fn snapshot() -> InstrumentSnapshot {
        InstrumentSnapshot {
            order_book_id: "RB1705".into(),
            venue_instrument_id: "rb1705".into(),
            underlying_symbol: "RB".into(),
            exchange_id: "SHFE".into(),
            contract_multiplier: dec!(10),
            long_margin_ratio: dec!(0.09),
            short_margin_ratio: dec!(0.09),
            margin_type: MarginType::ByMoney,
            open_commission_ratio: Decimal::ZERO,
            close_commission_ratio: Decimal::ZERO,
            close_today_commission_ratio: Decimal::ZERO,
            commission_type: None,
            commission_valid: false,
        }
    }

    #[test]
    fn test_select_by_money() {
        let rate = CommissionRate::select(
            "RB",
            ratios(dec!(0.0001), dec!(0.0001), dec!(0.0003)),
            CommissionRatios::default(),
        );
        assert_eq!(rate.open_ratio, dec!(0.0001));
        assert_eq!(rate.close_today_ratio, dec!(0.0003));
        assert_eq!(rate.commission_type, Some(CommissionType::ByMoney));
    }

    #[test]
    fn test_select_by_volume() {
        let rate = CommissionRate::select(
            "A",
            ratios(dec!(0), dec!(0.5), dec!(0)),
            ratios(dec!(2), dec!(2), dec!(1)),
        );
        assert_eq!(rate.open_ratio, dec!(2));
        assert_eq!(rate.close_ratio, dec!(2));
        assert_eq!(rate.close_today_ratio, dec!(1));
        assert_eq!(rate.commission_type, Some(CommissionType::ByVolume));
    }

    #[test]
    fn test_select_all_zero_falls_back_to_money() {
        let rate = CommissionRate::select(
            "CU",
            CommissionRatios::default(),
            CommissionRatios::default(),
        );
        assert_eq!(rate.open_ratio, Decimal::ZERO);
        assert_eq!(rate.commission_type, Some(CommissionType::ByMoney));
    }

    #[test]
    fn test_select_mixed_bases_is_ambiguous() {
        let rate = CommissionRate::select(
            "IF",
            ratios(dec!(0.000025), dec!(0.000025), dec!(0.0023)),
            ratios(dec!(1), dec!(1), dec!(0)),
        );
        assert_eq!(rate.open_ratio, dec!(0.000025));
        assert_eq!(rate.commission_type, None);
    }

    #[test]
    fn test_apply_commission_is_idempotent() {
        let rate = CommissionRate::select(
            "RB",
            ratios(dec!(0.0001), dec!(0.0001), dec!(0.0003)),
            CommissionRatios::default(),
        );

        let mut once = snapshot();
        once.apply_commission(&rate);
        let mut twice = once.clone();
        twice.apply_commission(&rate);

        assert!(once.commission_valid);
        assert_eq!(once, twice);
    }
}
