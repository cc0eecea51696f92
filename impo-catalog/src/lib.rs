pub mod product;
pub mod pricing;
pub mod shipping;
pub mod suggestions;

pub use product::{ItemPriceFormula, NewProduct, Product, ProductEdit, ProductError, ProductField};
pub use pricing::{CurrencyTotals, PricingConfig, PricingEngine, Totals};
pub use shipping::{ShippingCalculator, WeightBasedShipping};
pub use suggestions::{suggest_prices, PriceSuggestion, SuggestionKind};
