//! "Attractive" price suggestions for the final-price override.

use impo_shared::round_money;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    EndsIn90,
    EndsIn99,
    WholeUnit,
    NearestFive,
    NearestTen,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSuggestion {
    pub price: Decimal,
    pub kind: SuggestionKind,
    /// `(total - price) / total * 100`; positive means a discount.
    pub adjustment_percent: Decimal,
}

fn step_down(value: Decimal, step: Decimal) -> Decimal {
    (value / step).floor() * step
}

fn step_up(value: Decimal, step: Decimal) -> Decimal {
    (value / step).ceil() * step
}

/// Candidate round prices around `total`, kept within `band_percent` of it.
///
/// Result is sorted ascending with unique prices. Non-positive totals have no
/// suggestions.
pub fn suggest_prices(total: Decimal, band_percent: Decimal) -> Vec<PriceSuggestion> {
    let total = round_money(total);
    if total <= Decimal::ZERO {
        return Vec::new();
    }

    let ninety = Decimal::new(90, 2);
    let ninety_nine = Decimal::new(99, 2);
    let five = Decimal::new(5, 0);
    let floor = total.floor();

    let mut candidates = vec![
        (floor - Decimal::ONE + ninety, SuggestionKind::EndsIn90),
        (floor - Decimal::ONE + ninety_nine, SuggestionKind::EndsIn99),
        (floor + ninety, SuggestionKind::EndsIn90),
        (floor + ninety_nine, SuggestionKind::EndsIn99),
        (total.ceil(), SuggestionKind::WholeUnit),
        (step_down(total, five), SuggestionKind::NearestFive),
        (step_up(total, five), SuggestionKind::NearestFive),
        (step_down(total, Decimal::TEN), SuggestionKind::NearestTen),
        (step_up(total, Decimal::TEN), SuggestionKind::NearestTen),
    ];

    let band = total * band_percent.abs() / Decimal::ONE_HUNDRED;
    candidates.retain(|(price, _)| {
        *price >= Decimal::ZERO && *price != total && (*price - total).abs() <= band
    });

    // Stable sort keeps the first kind listed for duplicate prices
    candidates.sort_by(|a, b| a.0.cmp(&b.0));
    candidates.dedup_by(|a, b| a.0 == b.0);

    candidates
        .into_iter()
        .map(|(price, kind)| PriceSuggestion {
            price: price.normalize(),
            kind,
            adjustment_percent: round_money((total - price) / total * Decimal::ONE_HUNDRED),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_suggestions_around_total() {
        let suggestions = suggest_prices(d("395.9"), d("10"));
        let prices: Vec<Decimal> = suggestions.iter().map(|s| s.price).collect();

        assert_eq!(
            prices,
            vec![d("390"), d("394.90"), d("394.99"), d("395"), d("395.99"), d("396"), d("400")]
        );

        let four_hundred = suggestions.last().unwrap();
        assert_eq!(four_hundred.kind, SuggestionKind::NearestFive);
        assert_eq!(four_hundred.adjustment_percent, d("-1.04"));
    }

    #[test]
    fn test_suggestions_respect_band_and_sign() {
        for total in ["0.5", "1.5", "9.99", "49.95", "1234.56", "10"] {
            let total = d(total);
            for s in suggest_prices(total, d("10")) {
                assert!(s.price >= Decimal::ZERO);
                assert!((s.price - total).abs() <= total / Decimal::TEN);
                assert_ne!(s.price, total);
            }
        }
    }

    #[test]
    fn test_no_suggestions_for_empty_total() {
        assert!(suggest_prices(Decimal::ZERO, d("10")).is_empty());
        assert!(suggest_prices(d("-3"), d("10")).is_empty());
    }

    #[test]
    fn test_narrow_band_filters_everything_far() {
        let prices: Vec<Decimal> = suggest_prices(d("123.45"), d("1"))
            .into_iter()
            .map(|s| s.price)
            .collect();
        assert_eq!(prices, vec![d("122.90"), d("122.99"), d("123.90"), d("123.99"), d("124")]);
    }
}
