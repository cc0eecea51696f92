use crate::product::Product;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Freight estimate for a set of products, in USD.
pub trait ShippingCalculator: Send + Sync {
    fn shipping_usd(&self, products: &[Product]) -> Decimal;
}

/// Courier tariff: a flat rate per kilogram with a minimum charge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightBasedShipping {
    pub rate_per_kg_usd: Decimal,
    pub minimum_usd: Decimal,
}

impl Default for WeightBasedShipping {
    fn default() -> Self {
        Self {
            rate_per_kg_usd: Decimal::TEN,
            minimum_usd: Decimal::new(5, 0),
        }
    }
}

impl ShippingCalculator for WeightBasedShipping {
    fn shipping_usd(&self, products: &[Product]) -> Decimal {
        let weight: Decimal = products.iter().map(|p| p.weight_kg).sum();

        // Nothing to ship, nothing to charge
        if weight <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        (weight * self.rate_per_kg_usd).max(self.minimum_usd)
    }
}
