//! Proforma (preliminary invoice) built through a four-step wizard:
//! client, items, conditions, summary.

use chrono::{DateTime, Datelike, Duration, Utc};
use impo_shared::{round_money, Currency, Masked, MAX_AMOUNT};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;
use uuid::Uuid;

/// Peruvian VAT, 18%
pub const IGV_RATE: Decimal = Decimal::from_parts(18, 0, 0, false, 2);

const MAX_VALIDITY_DAYS: u32 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProformaStep {
    Client,
    Items,
    Conditions,
    Summary,
}

impl ProformaStep {
    fn previous(self) -> Self {
        match self {
            ProformaStep::Client | ProformaStep::Items => ProformaStep::Client,
            ProformaStep::Conditions => ProformaStep::Items,
            ProformaStep::Summary => ProformaStep::Conditions,
        }
    }
}

impl fmt::Display for ProformaStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProformaStep::Client => "client",
            ProformaStep::Items => "items",
            ProformaStep::Conditions => "conditions",
            ProformaStep::Summary => "summary",
        };
        f.write_str(s)
    }
}

/// DNI (8 digits) for people, RUC (11 digits) for companies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    Dni,
    Ruc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    pub document_number: String,
    #[serde(default)]
    pub email: Option<Masked<String>>,
    #[serde(default)]
    pub phone: Option<Masked<String>>,
    #[serde(default)]
    pub address: Option<String>,
}

impl ClientInfo {
    pub fn document_type(&self) -> Option<DocumentType> {
        let doc = self.document_number.trim();
        if !doc.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        match doc.len() {
            8 => Some(DocumentType::Dni),
            11 => Some(DocumentType::Ruc),
            _ => None,
        }
    }

    fn validate(&self) -> Result<(), ProformaError> {
        if self.name.trim().is_empty() {
            return Err(ProformaError::invalid("client.name", "is required"));
        }
        if self.document_type().is_none() {
            return Err(ProformaError::invalid(
                "client.document_number",
                "must be a DNI (8 digits) or RUC (11 digits)",
            ));
        }
        if let Some(email) = &self.email {
            if !email.expose().contains('@') {
                return Err(ProformaError::invalid("client.email", "is not a valid address"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProformaItem {
    pub description: String,
    pub quantity: u32,
    /// In the proforma's currency, before IGV
    pub unit_price: Decimal,
}

impl ProformaItem {
    /// `None` when the line does not fit in a `Decimal`.
    pub fn line_total(&self) -> Option<Decimal> {
        self.unit_price.checked_mul(Decimal::from(self.quantity))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProformaConditions {
    pub currency: Currency,
    pub validity_days: u32,
    pub delivery_days: u32,
    pub payment_terms: String,
}

impl ProformaConditions {
    fn validate(&self) -> Result<(), ProformaError> {
        if self.validity_days == 0 || self.validity_days > MAX_VALIDITY_DAYS {
            return Err(ProformaError::invalid(
                "conditions.validity_days",
                "must be between 1 and 90",
            ));
        }
        if self.payment_terms.trim().is_empty() {
            return Err(ProformaError::invalid("conditions.payment_terms", "is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProformaSummary {
    pub currency: Currency,
    pub subtotal: Decimal,
    pub igv: Decimal,
    pub total: Decimal,
}

impl ProformaSummary {
    pub fn compute(items: &[ProformaItem], currency: Currency) -> Result<Self, ProformaError> {
        let overflow = || ProformaError::invalid("items", "total is too large");

        let subtotal = items
            .iter()
            .try_fold(Decimal::ZERO, |acc, item| item.line_total().and_then(|line| acc.checked_add(line)))
            .ok_or_else(overflow)?;
        let subtotal = round_money(subtotal);
        let igv = round_money(subtotal.checked_mul(IGV_RATE).ok_or_else(overflow)?);
        let total = subtotal.checked_add(igv).ok_or_else(overflow)?;

        Ok(Self {
            currency,
            subtotal,
            igv,
            total,
        })
    }
}

/// A finished proforma, ready to be sent to the client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proforma {
    pub id: Uuid,
    pub number: String,
    pub client: ClientInfo,
    pub items: Vec<ProformaItem>,
    pub conditions: ProformaConditions,
    pub summary: ProformaSummary,
    pub issued_at: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

/// Collects a proforma step by step. Each step validates before the wizard
/// advances; going back keeps what was entered.
#[derive(Debug, Clone)]
pub struct ProformaWizard {
    step: ProformaStep,
    client: Option<ClientInfo>,
    items: Vec<ProformaItem>,
    conditions: Option<ProformaConditions>,
}

impl ProformaWizard {
    pub fn new() -> Self {
        Self {
            step: ProformaStep::Client,
            client: None,
            items: Vec::new(),
            conditions: None,
        }
    }

    pub fn step(&self) -> ProformaStep {
        self.step
    }

    pub fn submit_client(&mut self, client: ClientInfo) -> Result<ProformaStep, ProformaError> {
        self.expect_step(ProformaStep::Client)?;
        client.validate()?;

        self.client = Some(ClientInfo {
            name: client.name.trim().to_string(),
            document_number: client.document_number.trim().to_string(),
            ..client
        });
        self.step = ProformaStep::Items;
        Ok(self.step)
    }

    pub fn submit_items(&mut self, items: Vec<ProformaItem>) -> Result<ProformaStep, ProformaError> {
        self.expect_step(ProformaStep::Items)?;

        if items.is_empty() {
            return Err(ProformaError::invalid("items", "at least one item is required"));
        }
        for (i, item) in items.iter().enumerate() {
            if item.description.trim().is_empty() {
                return Err(ProformaError::invalid(format!("items[{}].description", i), "is required"));
            }
            if item.quantity == 0 {
                return Err(ProformaError::invalid(format!("items[{}].quantity", i), "must be at least 1"));
            }
            if item.unit_price <= Decimal::ZERO {
                return Err(ProformaError::invalid(format!("items[{}].unit_price", i), "must be positive"));
            }
            if item.unit_price > MAX_AMOUNT {
                return Err(ProformaError::invalid(
                    format!("items[{}].unit_price", i),
                    format!("must not exceed {}", MAX_AMOUNT),
                ));
            }
        }
        ProformaSummary::compute(&items, Currency::default())?;

        self.items = items;
        self.step = ProformaStep::Conditions;
        Ok(self.step)
    }

    pub fn submit_conditions(&mut self, conditions: ProformaConditions) -> Result<ProformaStep, ProformaError> {
        self.expect_step(ProformaStep::Conditions)?;
        conditions.validate()?;

        self.conditions = Some(conditions);
        self.step = ProformaStep::Summary;
        Ok(self.step)
    }

    pub fn back(&mut self) -> ProformaStep {
        self.step = self.step.previous();
        self.step
    }

    pub fn summary(&self) -> Result<ProformaSummary, ProformaError> {
        let conditions = self.conditions.as_ref().ok_or(ProformaError::Incomplete(ProformaStep::Conditions))?;
        if self.items.is_empty() {
            return Err(ProformaError::Incomplete(ProformaStep::Items));
        }
        ProformaSummary::compute(&self.items, conditions.currency)
    }

    /// Issue the proforma as `PF-<year>-<sequence>`.
    pub fn finish(self, sequence: u32) -> Result<Proforma, ProformaError> {
        self.expect_step(ProformaStep::Summary)?;
        let summary = self.summary()?;

        let client = self.client.ok_or(ProformaError::Incomplete(ProformaStep::Client))?;
        let conditions = self.conditions.ok_or(ProformaError::Incomplete(ProformaStep::Conditions))?;

        let issued_at = Utc::now();
        let proforma = Proforma {
            id: Uuid::new_v4(),
            number: format!("PF-{}-{:05}", issued_at.year(), sequence),
            valid_until: issued_at + Duration::days(i64::from(conditions.validity_days)),
            client,
            items: self.items,
            conditions,
            summary,
            issued_at,
        };

        info!(
            number = %proforma.number,
            client = %proforma.client.name,
            email = ?proforma.client.email,
            total = %proforma.summary.total,
            "Proforma issued"
        );
        Ok(proforma)
    }

    fn expect_step(&self, expected: ProformaStep) -> Result<(), ProformaError> {
        if self.step == expected {
            Ok(())
        } else {
            Err(ProformaError::WrongStep {
                expected,
                actual: self.step,
            })
        }
    }
}

impl Default for ProformaWizard {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProformaError {
    #[error("Expected to be at the {expected} step, currently at {actual}")]
    WrongStep {
        expected: ProformaStep,
        actual: ProformaStep,
    },

    #[error("Invalid {field}: {reason}")]
    Invalid { field: String, reason: String },

    #[error("The {0} step has not been completed")]
    Incomplete(ProformaStep),
}

impl ProformaError {
    fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ProformaError::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn client() -> ClientInfo {
        ClientInfo {
            name: " Importaciones Andinas SAC ".to_string(),
            document_number: "20123456789".to_string(),
            email: Some(Masked::new("compras@andinas.pe".to_string())),
            phone: None,
            address: None,
        }
    }

    fn items() -> Vec<ProformaItem> {
        vec![
            ProformaItem {
                description: "Zapatillas running".to_string(),
                quantity: 2,
                unit_price: d("150.50"),
            },
            ProformaItem {
                description: "Medias".to_string(),
                quantity: 3,
                unit_price: d("9.99"),
            },
        ]
    }

    fn conditions() -> ProformaConditions {
        ProformaConditions {
            currency: Currency::Pen,
            validity_days: 15,
            delivery_days: 20,
            payment_terms: "50% adelanto, 50% contra entrega".to_string(),
        }
    }

    #[test]
    fn test_full_wizard_flow() {
        let mut wizard = ProformaWizard::new();
        assert_eq!(wizard.submit_client(client()).unwrap(), ProformaStep::Items);
        assert_eq!(wizard.submit_items(items()).unwrap(), ProformaStep::Conditions);
        assert_eq!(wizard.submit_conditions(conditions()).unwrap(), ProformaStep::Summary);

        let summary = wizard.summary().unwrap();
        // 301.00 + 29.97 = 330.97; IGV 59.5746 -> 59.57
        assert_eq!(summary.subtotal, d("330.97"));
        assert_eq!(summary.igv, d("59.57"));
        assert_eq!(summary.total, d("390.54"));

        let proforma = wizard.finish(7).unwrap();
        assert!(proforma.number.starts_with("PF-"));
        assert!(proforma.number.ends_with("-00007"));
        assert_eq!(proforma.client.name, "Importaciones Andinas SAC");
        assert_eq!(proforma.valid_until - proforma.issued_at, Duration::days(15));
    }

    #[test]
    fn test_steps_must_be_completed_in_order() {
        let mut wizard = ProformaWizard::new();

        let err = wizard.submit_items(items()).unwrap_err();
        assert!(matches!(
            err,
            ProformaError::WrongStep { expected: ProformaStep::Items, actual: ProformaStep::Client }
        ));

        let err = wizard.clone().finish(1).unwrap_err();
        assert!(matches!(err, ProformaError::WrongStep { .. }));
    }

    #[test]
    fn test_back_keeps_entered_data() {
        let mut wizard = ProformaWizard::new();
        wizard.submit_client(client()).unwrap();
        wizard.submit_items(items()).unwrap();

        assert_eq!(wizard.back(), ProformaStep::Items);
        assert_eq!(wizard.back(), ProformaStep::Client);
        assert_eq!(wizard.back(), ProformaStep::Client);

        // Resubmitting the client keeps the items already entered
        wizard.submit_client(client()).unwrap();
        assert_eq!(wizard.items.len(), 2);
    }

    #[test]
    fn test_validation_blocks_submission() {
        let mut wizard = ProformaWizard::new();

        let mut bad = client();
        bad.document_number = "1234".to_string();
        assert!(matches!(wizard.submit_client(bad), Err(ProformaError::Invalid { .. })));
        assert_eq!(wizard.step(), ProformaStep::Client);

        wizard.submit_client(client()).unwrap();
        let mut bad_items = items();
        bad_items[1].quantity = 0;
        let err = wizard.submit_items(bad_items).unwrap_err();
        assert!(matches!(err, ProformaError::Invalid { field, .. } if field == "items[1].quantity"));
        assert!(wizard.submit_items(Vec::new()).is_err());

        wizard.submit_items(items()).unwrap();
        let mut bad_conditions = conditions();
        bad_conditions.validity_days = 120;
        assert!(wizard.submit_conditions(bad_conditions).is_err());
        assert_eq!(wizard.step(), ProformaStep::Conditions);
    }

    #[test]
    fn test_oversized_items_are_rejected() {
        let mut wizard = ProformaWizard::new();
        wizard.submit_client(client()).unwrap();

        let mut huge = items();
        huge[0].unit_price = d("79228162514264337593543950335");
        let err = wizard.submit_items(huge).unwrap_err();
        assert!(matches!(err, ProformaError::Invalid { field, .. } if field == "items[0].unit_price"));
        assert_eq!(wizard.step(), ProformaStep::Items);

        // Largest allowed price at the largest quantity still fits
        let mut max = items();
        max[0].unit_price = MAX_AMOUNT;
        max[0].quantity = u32::MAX;
        assert_eq!(wizard.submit_items(max).unwrap(), ProformaStep::Conditions);
    }

    #[test]
    fn test_summary_reports_overflow() {
        let item = ProformaItem {
            description: "Contenedor".to_string(),
            quantity: 2,
            unit_price: Decimal::MAX,
        };
        assert_eq!(item.line_total(), None);
        assert!(ProformaSummary::compute(&[item], Currency::Pen).is_err());
    }

    #[test]
    fn test_document_types() {
        let mut c = client();
        assert_eq!(c.document_type(), Some(DocumentType::Ruc));
        c.document_number = "45678912".to_string();
        assert_eq!(c.document_type(), Some(DocumentType::Dni));
        c.document_number = "4567891A".to_string();
        assert_eq!(c.document_type(), None);
    }
}
