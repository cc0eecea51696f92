use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Board column a promotion sits in
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PromotionStatus {
    Active,
    Inactive,
}

impl PromotionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromotionStatus::Active => "ACTIVE",
            PromotionStatus::Inactive => "INACTIVE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Some(PromotionStatus::Active),
            "INACTIVE" => Some(PromotionStatus::Inactive),
            _ => None,
        }
    }
}

/// A promotional campaign shown on the storefront while active
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Promotion {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub discount_percent: Decimal,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub status: PromotionStatus,
    /// Order within its column, starting at 0
    pub position: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Promotion {
    pub fn is_active(&self) -> bool {
        self.status == PromotionStatus::Active
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.ends_at.is_some_and(|end| end < now)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPromotion {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub discount_percent: Decimal,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
}

impl NewPromotion {
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title is required".to_string());
        }
        if self.discount_percent <= Decimal::ZERO || self.discount_percent > Decimal::ONE_HUNDRED {
            return Err("discount_percent must be greater than 0 and at most 100".to_string());
        }
        if let (Some(start), Some(end)) = (self.starts_at, self.ends_at) {
            if end <= start {
                return Err("ends_at must be after starts_at".to_string());
            }
        }
        Ok(())
    }

    /// Inactive promotion placed at `position`.
    pub(crate) fn into_promotion(self, position: u32, now: DateTime<Utc>) -> Promotion {
        Promotion {
            id: Uuid::new_v4(),
            title: self.title.trim().to_string(),
            description: self.description.filter(|d| !d.trim().is_empty()),
            discount_percent: self.discount_percent,
            starts_at: self.starts_at.unwrap_or(now),
            ends_at: self.ends_at,
            status: PromotionStatus::Inactive,
            position,
            created_at: now,
            updated_at: now,
        }
    }
}
