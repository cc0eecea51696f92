//! Money primitives shared by the pricing engine, requests and proformas.
//!
//! All amounts are `rust_decimal::Decimal`. Rounding only happens at the edges
//! (display and persisted overrides), never inside the aggregate sums.

use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Monetary values are shown with 2 decimal places, half away from zero.
const DECIMAL_PLACES: u32 = 2;

/// USD→PEN rate used when none is supplied (3.7).
pub const DEFAULT_EXCHANGE_RATE: Decimal = Decimal::from_parts(37, 0, 0, false, 1);

/// Rates are kept to 4 decimal places, the precision the store holds.
pub const RATE_DECIMAL_PLACES: u32 = 4;

/// Smallest accepted rate, 0.0001.
pub const MIN_EXCHANGE_RATE: Decimal = Decimal::from_parts(1, 0, 0, false, 4);

/// Largest accepted rate.
pub const MAX_EXCHANGE_RATE: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);

/// Upper bound for any single amount an operator types (prices, profits,
/// weights). Keeps every product of amounts and rates far from `Decimal::MAX`.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    #[default]
    Pen,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Pen => "PEN",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USD" => Ok(Currency::Usd),
            "PEN" => Ok(Currency::Pen),
            other => Err(format!("unknown currency: {}", other)),
        }
    }
}

/// USD→PEN multiplier. Always strictly positive once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ExchangeRate(Decimal);

impl ExchangeRate {
    /// Accepts rates within [`MIN_EXCHANGE_RATE`]..=[`MAX_EXCHANGE_RATE`],
    /// rounded to [`RATE_DECIMAL_PLACES`].
    pub fn new(rate: Decimal) -> Option<Self> {
        if rate < MIN_EXCHANGE_RATE || rate > MAX_EXCHANGE_RATE {
            return None;
        }
        Some(Self(rate.round_dp_with_strategy(
            RATE_DECIMAL_PLACES,
            RoundingStrategy::MidpointAwayFromZero,
        )))
    }

    /// Picks the supplied rate, or `default` when it is missing or out of range.
    /// An unusable `default` falls back to [`DEFAULT_EXCHANGE_RATE`].
    pub fn resolve(rate: Option<Decimal>, default: Decimal) -> Self {
        rate.and_then(Self::new)
            .or_else(|| Self::new(default))
            .unwrap_or_default()
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn to_pen(&self, usd: Decimal) -> Decimal {
        usd * self.0
    }

    pub fn to_usd(&self, pen: Decimal) -> Decimal {
        pen / self.0
    }

    pub fn checked_to_pen(&self, usd: Decimal) -> Option<Decimal> {
        usd.checked_mul(self.0)
    }

    pub fn checked_to_usd(&self, pen: Decimal) -> Option<Decimal> {
        pen.checked_div(self.0)
    }

    pub fn convert(&self, amount: Decimal, from: Currency, to: Currency) -> Decimal {
        match (from, to) {
            (Currency::Usd, Currency::Pen) => self.to_pen(amount),
            (Currency::Pen, Currency::Usd) => self.to_usd(amount),
            _ => amount,
        }
    }
}

impl Default for ExchangeRate {
    fn default() -> Self {
        Self(DEFAULT_EXCHANGE_RATE)
    }
}

/// Round to cents for display or storage.
#[inline]
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Lenient parser for amounts typed by an operator.
///
/// Accepts `"12.5"`, `" 12,5 "` and `"1,234.50"`. Anything else yields `None`
/// so callers can ignore the keystroke.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let normalized = if trimmed.contains('.') {
        trimmed.replace(',', "")
    } else {
        trimmed.replace(',', ".")
    };

    Decimal::from_str(&normalized).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_default_rate_is_three_point_seven() {
        assert_eq!(DEFAULT_EXCHANGE_RATE, d("3.7"));
        assert_eq!(ExchangeRate::default().value(), d("3.7"));
    }

    #[test]
    fn test_resolve_falls_back_on_missing_or_zero() {
        let default = DEFAULT_EXCHANGE_RATE;
        assert_eq!(ExchangeRate::resolve(None, default).value(), d("3.7"));
        assert_eq!(ExchangeRate::resolve(Some(Decimal::ZERO), default).value(), d("3.7"));
        assert_eq!(ExchangeRate::resolve(Some(d("-1")), default).value(), d("3.7"));
        assert_eq!(ExchangeRate::resolve(Some(d("3.85")), default).value(), d("3.85"));
        assert_eq!(ExchangeRate::resolve(None, Decimal::ZERO).value(), d("3.7"));
    }

    #[test]
    fn test_rate_bounds_and_precision() {
        assert_eq!(ExchangeRate::new(d("3.71256")).unwrap().value(), d("3.7126"));
        assert_eq!(ExchangeRate::new(d("0.0001")).unwrap().value(), d("0.0001"));
        assert_eq!(ExchangeRate::new(d("10000")).unwrap().value(), d("10000"));
        assert!(ExchangeRate::new(d("0.0000000000000000000000000001")).is_none());
        assert!(ExchangeRate::new(d("10000.01")).is_none());

        // Out-of-range rates never reach the arithmetic
        let tiny = ExchangeRate::resolve(Some(d("0.0000000000000000000000000001")), DEFAULT_EXCHANGE_RATE);
        assert_eq!(tiny.value(), d("3.7"));
    }

    #[test]
    fn test_checked_conversions() {
        let rate = ExchangeRate::new(d("0.0001")).unwrap();
        assert_eq!(rate.checked_to_usd(d("1")), Some(d("10000")));
        assert_eq!(rate.checked_to_usd(Decimal::MAX), None);
        assert_eq!(ExchangeRate::default().checked_to_pen(Decimal::MAX), None);
    }

    #[test]
    fn test_convert_between_currencies() {
        let rate = ExchangeRate::resolve(Some(d("3.7")), DEFAULT_EXCHANGE_RATE);
        assert_eq!(rate.convert(d("107"), Currency::Usd, Currency::Pen), d("395.9"));
        assert_eq!(rate.convert(d("37"), Currency::Pen, Currency::Usd), d("10"));
        assert_eq!(rate.convert(d("5"), Currency::Pen, Currency::Pen), d("5"));
    }

    #[test]
    fn test_round_money_half_away_from_zero() {
        assert_eq!(round_money(d("1.005")), d("1.01"));
        assert_eq!(round_money(d("-1.005")), d("-1.01"));
        assert_eq!(round_money(d("2.344")), d("2.34"));
    }

    #[test]
    fn test_parse_amount_is_lenient() {
        assert_eq!(parse_amount("12.5"), Some(d("12.5")));
        assert_eq!(parse_amount(" 12,5 "), Some(d("12.5")));
        assert_eq!(parse_amount("1,234.50"), Some(d("1234.50")));
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_amount("NaN"), None);
        assert_eq!(parse_amount("12.5.1"), None);
    }

    #[test]
    fn test_currency_parsing() {
        assert_eq!("usd".parse::<Currency>().unwrap(), Currency::Usd);
        assert_eq!(" PEN".parse::<Currency>().unwrap(), Currency::Pen);
        assert!("EUR".parse::<Currency>().is_err());
        assert_eq!(serde_json::to_string(&Currency::Usd).unwrap(), "\"USD\"");
    }
}
