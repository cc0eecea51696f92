use crate::models::PurchaseRequest;
use impo_catalog::{CurrencyTotals, PriceSuggestion, PricingEngine, Product};
use impo_shared::{round_money, Currency};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What the totals card shows for one display currency.
///
/// Built on read from the current products; the stored PEN override is only
/// converted for display, never rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteView {
    pub request_id: Option<Uuid>,
    pub currency: Currency,
    pub exchange_rate: Decimal,
    pub totals: CurrencyTotals,
    /// Computed total before any override
    pub original_total: Decimal,
    /// Override converted to `currency`, or the original total
    pub final_price: Decimal,
    pub final_price_pen: Option<Decimal>,
    pub adjustment_percent: Decimal,
    pub suggestions: Vec<PriceSuggestion>,
}

impl QuoteView {
    pub fn build(request: &PurchaseRequest, engine: &PricingEngine, currency: Currency) -> Self {
        let mut view = Self::for_products(
            &request.products,
            request.exchange_rate,
            request.final_price_pen,
            engine,
            currency,
        );
        view.request_id = Some(request.id);
        view
    }

    pub fn for_products(
        products: &[Product],
        exchange_rate: Option<Decimal>,
        final_price_pen: Option<Decimal>,
        engine: &PricingEngine,
        currency: Currency,
    ) -> Self {
        let rate = engine.exchange_rate(exchange_rate);
        let totals = engine.calculate_totals(products, exchange_rate);

        let original_total = round_money(totals.total(currency));
        let adjustment = match final_price_pen {
            Some(final_pen) => adjustment_percent(totals.total_pen, final_pen),
            None => Decimal::ZERO,
        };
        let final_price = final_price_pen
            .map(|pen| round_money(rate.convert(pen, Currency::Pen, currency)))
            .unwrap_or(original_total);

        Self {
            request_id: None,
            currency,
            exchange_rate: rate.value(),
            totals: totals.in_currency(currency),
            original_total,
            final_price,
            final_price_pen,
            adjustment_percent: adjustment,
            suggestions: engine.suggest_prices(totals.total(currency)),
        }
    }
}

/// `(original - final) / original * 100`, rounded to cents; 0 for a total
/// below one cent.
pub fn adjustment_percent(original_total: Decimal, final_price: Decimal) -> Decimal {
    if round_money(original_total).is_zero() {
        return Decimal::ZERO;
    }
    original_total
        .checked_sub(final_price)
        .and_then(|diff| diff.checked_div(original_total))
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .map_or(Decimal::ZERO, round_money)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewRequest;
    use impo_catalog::{NewProduct, ProductEdit};
    use impo_shared::ExchangeRate;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn request_with_product() -> PurchaseRequest {
        let engine = PricingEngine::default();
        let mut req = PurchaseRequest::new(NewRequest {
            client_name: "Carlos Mamani".to_string(),
            client_phone: None,
            notes: None,
            exchange_rate: Some(d("3.7")),
        })
        .unwrap();

        let product = req
            .add_product(
                NewProduct {
                    name: "Audífonos".to_string(),
                    link: None,
                    base_price: d("100"),
                    profit_amount: Decimal::ZERO,
                    tax_percent: d("7"),
                    weight_kg: Decimal::ZERO,
                },
                &engine,
            )
            .unwrap();
        req.edit_product(product.id, ProductEdit::TaxPercent(d("7"))).unwrap();
        req
    }

    #[test]
    fn test_quote_without_override() {
        let req = request_with_product();
        let view = QuoteView::build(&req, &PricingEngine::default(), Currency::Pen);

        assert_eq!(view.request_id, Some(req.id));
        assert_eq!(view.original_total, d("395.90"));
        assert_eq!(view.final_price, d("395.90"));
        assert_eq!(view.adjustment_percent, Decimal::ZERO);
        assert_eq!(view.totals.subtotal, d("395.9"));
        assert!(!view.suggestions.is_empty());
    }

    #[test]
    fn test_currency_toggle_keeps_stored_pen() {
        let engine = PricingEngine::default();
        let mut req = request_with_product();
        let rate = ExchangeRate::resolve(req.exchange_rate, d("3.7"));
        req.set_final_price(d("390"), Currency::Pen, rate).unwrap();
        let stored = req.final_price_pen;

        let pen = QuoteView::build(&req, &engine, Currency::Pen);
        let usd = QuoteView::build(&req, &engine, Currency::Usd);

        assert_eq!(req.final_price_pen, stored);
        assert_eq!(pen.final_price_pen, Some(d("390")));
        assert_eq!(usd.final_price_pen, Some(d("390")));
        assert_eq!(pen.final_price, d("390"));
        assert_eq!(usd.final_price, d("105.41"));
        assert_eq!(usd.original_total, d("107"));

        // Same override, same adjustment regardless of the display currency
        assert_eq!(pen.adjustment_percent, usd.adjustment_percent);
        assert_eq!(pen.adjustment_percent, d("1.49"));

        // Suggestions follow the display currency
        assert!(usd.suggestions.iter().all(|s| s.price < d("120")));
        assert!(pen.suggestions.iter().all(|s| s.price > d("350")));
    }

    #[test]
    fn test_adjustment_percent() {
        assert_eq!(adjustment_percent(d("200"), d("180")), d("10"));
        assert_eq!(adjustment_percent(d("200"), d("220")), d("-10"));
        assert_eq!(adjustment_percent(Decimal::ZERO, d("50")), Decimal::ZERO);
        assert_eq!(adjustment_percent(d("0.0000000000000000000000000001"), d("1000000000")), Decimal::ZERO);
    }
}
