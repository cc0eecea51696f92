use crate::product::Product;
use crate::shipping::{ShippingCalculator, WeightBasedShipping};
use crate::suggestions::{suggest_prices, PriceSuggestion};
use impo_shared::{round_money, Currency, ExchangeRate, DEFAULT_EXCHANGE_RATE};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// USD→PEN rate when a request carries none
    pub default_exchange_rate: Decimal,

    /// Half-width of the band, in percent of the total, that suggestions must fall in
    pub suggestion_band_percent: Decimal,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            default_exchange_rate: DEFAULT_EXCHANGE_RATE,
            suggestion_band_percent: Decimal::TEN,
        }
    }
}

/// Aggregates for a product list, unrounded.
///
/// Every component is summed in USD and converted with the same rate, so
/// `total_pen == total_usd * exchange_rate` holds exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub exchange_rate: Decimal,
    pub subtotal_usd: Decimal,
    pub subtotal_pen: Decimal,
    pub shipping_usd: Decimal,
    pub shipping_pen: Decimal,
    pub profit_usd: Decimal,
    pub profit_pen: Decimal,
    /// Already included in the subtotal; informative only
    pub tax_usd: Decimal,
    pub tax_pen: Decimal,
    pub total_usd: Decimal,
    pub total_pen: Decimal,
}

/// One currency's view of [`Totals`], rounded to cents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyTotals {
    pub currency: Currency,
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub profit: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

impl Totals {
    pub fn total(&self, currency: Currency) -> Decimal {
        match currency {
            Currency::Usd => self.total_usd,
            Currency::Pen => self.total_pen,
        }
    }

    pub fn in_currency(&self, currency: Currency) -> CurrencyTotals {
        let (subtotal, shipping, profit, tax, total) = match currency {
            Currency::Usd => (
                self.subtotal_usd,
                self.shipping_usd,
                self.profit_usd,
                self.tax_usd,
                self.total_usd,
            ),
            Currency::Pen => (
                self.subtotal_pen,
                self.shipping_pen,
                self.profit_pen,
                self.tax_pen,
                self.total_pen,
            ),
        };

        CurrencyTotals {
            currency,
            subtotal: round_money(subtotal),
            shipping: round_money(shipping),
            profit: round_money(profit),
            tax: round_money(tax),
            total: round_money(total),
        }
    }
}

/// Stateless pricing engine. Nothing is cached; every call folds the current list.
#[derive(Clone)]
pub struct PricingEngine {
    config: PricingConfig,
    shipping: Arc<dyn ShippingCalculator>,
}

impl PricingEngine {
    pub fn new(config: PricingConfig, shipping: Arc<dyn ShippingCalculator>) -> Self {
        Self { config, shipping }
    }

    /// Resolve a possibly missing rate against the configured default.
    pub fn exchange_rate(&self, rate: Option<Decimal>) -> ExchangeRate {
        ExchangeRate::resolve(rate, self.config.default_exchange_rate)
    }

    pub fn calculate_totals(&self, products: &[Product], rate: Option<Decimal>) -> Totals {
        let rate = self.exchange_rate(rate);

        let (subtotal_usd, profit_pen, tax_usd) = products.iter().fold(
            (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
            |(subtotal, profit, tax), p| (subtotal + p.price, profit + p.profit_amount, tax + p.tax_amount()),
        );

        let shipping_usd = self.shipping.shipping_usd(products);
        let profit_usd = rate.to_usd(profit_pen);
        let total_usd = subtotal_usd + shipping_usd + profit_usd;

        Totals {
            exchange_rate: rate.value(),
            subtotal_usd,
            subtotal_pen: rate.to_pen(subtotal_usd),
            shipping_usd,
            shipping_pen: rate.to_pen(shipping_usd),
            profit_usd,
            profit_pen: rate.to_pen(profit_usd),
            tax_usd,
            tax_pen: rate.to_pen(tax_usd),
            total_usd,
            total_pen: rate.to_pen(total_usd),
        }
    }

    /// Suggestions for a total already expressed in the display currency.
    pub fn suggest_prices(&self, total: Decimal) -> Vec<PriceSuggestion> {
        suggest_prices(total, self.config.suggestion_band_percent)
    }
}

impl Default for PricingEngine {
    fn default() -> Self {
        Self::new(PricingConfig::default(), Arc::new(WeightBasedShipping::default()))
    }
}
