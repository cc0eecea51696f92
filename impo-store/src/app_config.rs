use impo_catalog::{PricingConfig, WeightBasedShipping};
use impo_request::SessionConfig;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub pricing: PricingSettings,
    pub shipping: ShippingSettings,
    pub sync: SyncSettings,
    pub promotions: PromotionSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

/// Without a URL the service runs on in-memory repositories.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct PricingSettings {
    pub default_exchange_rate: Decimal,
    pub suggestion_band_percent: Decimal,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ShippingSettings {
    pub rate_per_kg_usd: Decimal,
    pub minimum_usd: Decimal,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncSettings {
    pub debounce_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PromotionSettings {
    pub max_active: usize,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `IMPO_DATABASE__URL=postgres://...`
            .add_source(config::Environment::with_prefix("IMPO").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    pub fn pricing_config(&self) -> PricingConfig {
        PricingConfig {
            default_exchange_rate: self.pricing.default_exchange_rate,
            suggestion_band_percent: self.pricing.suggestion_band_percent,
        }
    }

    pub fn shipping_calculator(&self) -> WeightBasedShipping {
        WeightBasedShipping {
            rate_per_kg_usd: self.shipping.rate_per_kg_usd,
            minimum_usd: self.shipping.minimum_usd,
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            debounce: Duration::from_millis(self.sync.debounce_ms),
        }
    }
}
