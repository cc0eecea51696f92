use impo_shared::{parse_amount, ExchangeRate, MAX_AMOUNT};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use uuid::Uuid;

/// How a product's unit `price` (USD) was derived.
///
/// The add-product dialog and the inline editor disagree on whether profit is
/// part of the unit price, so both formulas exist and every product records
/// which one priced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemPriceFormula {
    /// `base_price * (1 + tax_percent / 100)`; used by inline edits.
    #[default]
    TaxOnBase,
    /// `(base_price + profit_amount / rate) * (1 + tax_percent / 100)`; used when adding.
    WithProfit,
}

impl ItemPriceFormula {
    /// `None` when the result does not fit in a `Decimal`.
    pub fn unit_price(
        &self,
        base_price: Decimal,
        profit_amount_pen: Decimal,
        tax_percent: Decimal,
        rate: ExchangeRate,
    ) -> Option<Decimal> {
        let taxed = tax_multiplier(tax_percent)?;
        match self {
            ItemPriceFormula::TaxOnBase => base_price.checked_mul(taxed),
            ItemPriceFormula::WithProfit => rate
                .checked_to_usd(profit_amount_pen)
                .and_then(|profit| base_price.checked_add(profit))
                .and_then(|net| net.checked_mul(taxed)),
        }
    }
}

#[inline]
fn tax_multiplier(tax_percent: Decimal) -> Option<Decimal> {
    tax_percent
        .checked_div(Decimal::ONE_HUNDRED)
        .and_then(|t| Decimal::ONE.checked_add(t))
}

fn price_overflow() -> ProductError {
    ProductError::InvalidField {
        field: ProductField::BasePrice,
        reason: "is too large to price".to_string(),
    }
}

/// A product line inside a purchase request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub link: Option<String>,
    /// Supplier cost in USD
    pub base_price: Decimal,
    /// Margin in PEN
    pub profit_amount: Decimal,
    pub tax_percent: Decimal,
    pub weight_kg: Decimal,
    /// Derived unit price in USD
    pub price: Decimal,
    #[serde(default)]
    pub price_formula: ItemPriceFormula,
}

impl Product {
    /// Tax on the base price only, in USD.
    pub fn tax_amount(&self) -> Decimal {
        self.base_price * self.tax_percent / Decimal::ONE_HUNDRED
    }

    /// Apply a single-field inline edit and reprice with [`ItemPriceFormula::TaxOnBase`].
    ///
    /// Profit never enters this formula; editing it still recomputes `price`
    /// from the current base price and tax.
    ///
    /// The product is left untouched when the edit is rejected.
    pub fn apply_edit(&mut self, edit: ProductEdit) -> Result<(), ProductError> {
        edit.validate()?;
        let field = edit.field();

        let mut next = self.clone();
        match edit {
            ProductEdit::Name(name) => next.name = name,
            ProductEdit::Link(link) => next.link = link,
            ProductEdit::BasePrice(v) => next.base_price = v,
            ProductEdit::ProfitAmount(v) => next.profit_amount = v,
            ProductEdit::TaxPercent(v) => next.tax_percent = v,
            ProductEdit::Weight(v) => next.weight_kg = v,
        }
        next.reprice()?;

        *self = next;
        debug!(product_id = %self.id, %field, price = %self.price, "Product edited");
        Ok(())
    }

    pub fn reprice(&mut self) -> Result<(), ProductError> {
        let formula = ItemPriceFormula::TaxOnBase;
        self.price = formula
            .unit_price(self.base_price, self.profit_amount, self.tax_percent, ExchangeRate::default())
            .ok_or_else(price_overflow)?;
        self.price_formula = formula;
        Ok(())
    }
}

/// Payload of the add-product dialog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub link: Option<String>,
    pub base_price: Decimal,
    #[serde(default)]
    pub profit_amount: Decimal,
    pub tax_percent: Decimal,
    #[serde(default)]
    pub weight_kg: Decimal,
}

impl NewProduct {
    pub fn validate(&self) -> Result<(), ProductError> {
        ProductEdit::Name(self.name.trim().to_string()).validate()?;
        ProductEdit::BasePrice(self.base_price).validate()?;
        ProductEdit::ProfitAmount(self.profit_amount).validate()?;
        ProductEdit::TaxPercent(self.tax_percent).validate()?;
        ProductEdit::Weight(self.weight_kg).validate()
    }

    /// Build the product, pricing it with [`ItemPriceFormula::WithProfit`].
    pub fn into_product(self, rate: ExchangeRate) -> Result<Product, ProductError> {
        self.validate()?;

        let formula = ItemPriceFormula::WithProfit;
        let price = formula
            .unit_price(self.base_price, self.profit_amount, self.tax_percent, rate)
            .ok_or_else(price_overflow)?;

        Ok(Product {
            id: Uuid::new_v4(),
            name: self.name.trim().to_string(),
            link: self.link.filter(|l| !l.trim().is_empty()),
            base_price: self.base_price,
            profit_amount: self.profit_amount,
            tax_percent: self.tax_percent,
            weight_kg: self.weight_kg,
            price,
            price_formula: formula,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductField {
    Name,
    Link,
    BasePrice,
    ProfitAmount,
    TaxPercent,
    Weight,
}

impl ProductField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductField::Name => "name",
            ProductField::Link => "link",
            ProductField::BasePrice => "base_price",
            ProductField::ProfitAmount => "profit_amount",
            ProductField::TaxPercent => "tax_percent",
            ProductField::Weight => "weight",
        }
    }
}

impl fmt::Display for ProductField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single inline edit, already parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum ProductEdit {
    Name(String),
    Link(Option<String>),
    BasePrice(Decimal),
    ProfitAmount(Decimal),
    TaxPercent(Decimal),
    Weight(Decimal),
}

impl ProductEdit {
    /// Parse raw editor input. Returns `None` when a numeric field does not parse,
    /// which callers treat as "ignore this keystroke".
    pub fn parse(field: ProductField, raw: &str) -> Option<Self> {
        match field {
            ProductField::Name => Some(ProductEdit::Name(raw.trim().to_string())),
            ProductField::Link => {
                let link = raw.trim();
                Some(ProductEdit::Link((!link.is_empty()).then(|| link.to_string())))
            }
            ProductField::BasePrice => parse_amount(raw).map(ProductEdit::BasePrice),
            ProductField::ProfitAmount => parse_amount(raw).map(ProductEdit::ProfitAmount),
            ProductField::TaxPercent => parse_amount(raw).map(ProductEdit::TaxPercent),
            ProductField::Weight => parse_amount(raw).map(ProductEdit::Weight),
        }
    }

    pub fn field(&self) -> ProductField {
        match self {
            ProductEdit::Name(_) => ProductField::Name,
            ProductEdit::Link(_) => ProductField::Link,
            ProductEdit::BasePrice(_) => ProductField::BasePrice,
            ProductEdit::ProfitAmount(_) => ProductField::ProfitAmount,
            ProductEdit::TaxPercent(_) => ProductField::TaxPercent,
            ProductEdit::Weight(_) => ProductField::Weight,
        }
    }

    fn validate(&self) -> Result<(), ProductError> {
        let invalid = |reason: &str| ProductError::InvalidField {
            field: self.field(),
            reason: reason.to_string(),
        };

        match self {
            ProductEdit::Name(name) if name.trim().is_empty() => Err(invalid("is required")),
            ProductEdit::BasePrice(v) | ProductEdit::ProfitAmount(v) | ProductEdit::Weight(v)
                if *v < Decimal::ZERO =>
            {
                Err(invalid("must not be negative"))
            }
            ProductEdit::BasePrice(v) | ProductEdit::ProfitAmount(v) | ProductEdit::Weight(v)
                if *v > MAX_AMOUNT =>
            {
                Err(invalid("must not exceed 1000000000"))
            }
            ProductEdit::TaxPercent(v) if *v < Decimal::ZERO || *v > Decimal::ONE_HUNDRED => {
                Err(invalid("must be between 0 and 100"))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProductError {
    #[error("Invalid {field}: {reason}")]
    InvalidField { field: ProductField, reason: String },

    #[error("Product not found: {0}")]
    NotFound(Uuid),
}
