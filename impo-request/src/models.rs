use chrono::{DateTime, Utc};
use impo_catalog::{NewProduct, PricingEngine, Product, ProductEdit, ProductError};
use impo_shared::{round_money, Currency, ExchangeRate, MAX_AMOUNT, MAX_EXCHANGE_RATE, MIN_EXCHANGE_RATE};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Purchase request status in the workflow
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Quoted,
    Approved,
    Ordered,
    InTransit,
    Delivered,
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "PENDING",
            RequestStatus::Quoted => "QUOTED",
            RequestStatus::Approved => "APPROVED",
            RequestStatus::Ordered => "ORDERED",
            RequestStatus::InTransit => "IN_TRANSIT",
            RequestStatus::Delivered => "DELIVERED",
            RequestStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        [
            RequestStatus::Pending,
            RequestStatus::Quoted,
            RequestStatus::Approved,
            RequestStatus::Ordered,
            RequestStatus::InTransit,
            RequestStatus::Delivered,
            RequestStatus::Cancelled,
        ]
        .into_iter()
        .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Delivered | RequestStatus::Cancelled)
    }

    /// Pending → Quoted → Approved → Ordered → InTransit → Delivered, with
    /// Quoted → Pending for re-quoting and Cancelled from any open state.
    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        use RequestStatus::*;

        if next == Cancelled {
            return !self.is_terminal();
        }

        matches!(
            (self, next),
            (Pending, Quoted)
                | (Quoted, Pending)
                | (Quoted, Approved)
                | (Approved, Ordered)
                | (Ordered, InTransit)
                | (InTransit, Delivered)
        )
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload for opening a new purchase request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRequest {
    pub client_name: String,
    #[serde(default)]
    pub client_phone: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub exchange_rate: Option<Decimal>,
}

/// A client's request to import a set of products
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub id: Uuid,
    pub client_name: String,
    pub client_phone: Option<String>,
    pub notes: Option<String>,
    pub status: RequestStatus,
    pub products: Vec<Product>,
    /// Request-specific USD→PEN rate; the engine default applies when `None`
    pub exchange_rate: Option<Decimal>,
    /// Manual override of the total, always in PEN
    pub final_price_pen: Option<Decimal>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PurchaseRequest {
    pub fn new(new: NewRequest) -> Result<Self, RequestError> {
        let client_name = new.client_name.trim().to_string();
        if client_name.is_empty() {
            return Err(RequestError::Validation("client_name is required".to_string()));
        }
        let exchange_rate = check_rate(new.exchange_rate)?;

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            client_name,
            client_phone: new.client_phone.filter(|p| !p.trim().is_empty()),
            notes: new.notes,
            status: RequestStatus::Pending,
            products: Vec::new(),
            exchange_rate,
            final_price_pen: None,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_editable(&self) -> bool {
        !self.status.is_terminal()
    }

    pub fn product(&self, product_id: Uuid) -> Option<&Product> {
        self.products.iter().find(|p| p.id == product_id)
    }

    /// Add a product through the add-product path (profit included in its price).
    pub fn add_product(&mut self, draft: NewProduct, engine: &PricingEngine) -> Result<Product, RequestError> {
        self.ensure_editable()?;

        let product = draft.into_product(engine.exchange_rate(self.exchange_rate))?;
        self.products.push(product.clone());
        self.touch();
        Ok(product)
    }

    pub fn edit_product(&mut self, product_id: Uuid, edit: ProductEdit) -> Result<&Product, RequestError> {
        self.ensure_editable()?;

        let product = self
            .products
            .iter_mut()
            .find(|p| p.id == product_id)
            .ok_or(ProductError::NotFound(product_id))?;
        product.apply_edit(edit)?;

        self.touch();
        self.product(product_id).ok_or(RequestError::Product(ProductError::NotFound(product_id)))
    }

    pub fn remove_product(&mut self, product_id: Uuid) -> Result<Product, RequestError> {
        self.ensure_editable()?;

        let index = self
            .products
            .iter()
            .position(|p| p.id == product_id)
            .ok_or(ProductError::NotFound(product_id))?;
        let removed = self.products.remove(index);

        self.touch();
        Ok(removed)
    }

    /// A missing or zero rate clears the request-specific rate. Others are
    /// stored rounded to 4 decimal places.
    pub fn set_exchange_rate(&mut self, rate: Option<Decimal>) -> Result<(), RequestError> {
        self.ensure_editable()?;
        let rate = check_rate(rate)?;

        self.exchange_rate = rate;
        self.touch();
        Ok(())
    }

    /// Store a final price typed in `currency`; it is kept in PEN.
    pub fn set_final_price(&mut self, amount: Decimal, currency: Currency, rate: ExchangeRate) -> Result<Decimal, RequestError> {
        self.ensure_editable()?;
        check_final_price(amount)?;

        let pen = match currency {
            Currency::Pen => amount,
            Currency::Usd => rate.checked_to_pen(amount).ok_or_else(|| {
                RequestError::Validation("final price is too large".to_string())
            })?,
        };
        let pen = round_money(pen);
        self.final_price_pen = Some(pen);
        self.touch();
        Ok(pen)
    }

    pub fn clear_final_price(&mut self) -> Result<(), RequestError> {
        self.ensure_editable()?;

        self.final_price_pen = None;
        self.touch();
        Ok(())
    }

    /// Move to `next`, returning the previous status.
    pub fn transition(&mut self, next: RequestStatus) -> Result<RequestStatus, RequestError> {
        if !self.status.can_transition_to(next) {
            return Err(RequestError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        let previous = self.status;
        self.status = next;
        self.touch();
        Ok(previous)
    }

    fn ensure_editable(&self) -> Result<(), RequestError> {
        if self.is_editable() {
            Ok(())
        } else {
            Err(RequestError::Locked(self.status))
        }
    }

    fn touch(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now();
    }
}

/// Validate a request-specific rate. Zero means "use the default" and maps to `None`.
pub fn check_rate(rate: Option<Decimal>) -> Result<Option<Decimal>, RequestError> {
    match rate {
        None => Ok(None),
        Some(r) if r.is_zero() => Ok(None),
        Some(r) if r < Decimal::ZERO => Err(RequestError::Validation(
            "exchange_rate must not be negative".to_string(),
        )),
        Some(r) => ExchangeRate::new(r).map(|rate| Some(rate.value())).ok_or_else(|| {
            RequestError::Validation(format!(
                "exchange_rate must be between {} and {}",
                MIN_EXCHANGE_RATE, MAX_EXCHANGE_RATE
            ))
        }),
    }
}

pub fn check_final_price(amount: Decimal) -> Result<(), RequestError> {
    if amount < Decimal::ZERO {
        return Err(RequestError::Validation("final price must not be negative".to_string()));
    }
    if amount > MAX_AMOUNT {
        return Err(RequestError::Validation(format!("final price must not exceed {}", MAX_AMOUNT)));
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("Purchase request not found: {0}")]
    NotFound(Uuid),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: RequestStatus, to: RequestStatus },

    #[error("Request is {0} and can no longer be edited")]
    Locked(RequestStatus),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Product(#[from] ProductError),
}
