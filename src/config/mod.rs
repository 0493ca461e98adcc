use rust_decimal::Decimal;
use serde::Deserialize;

use crate::services::TradingConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default = "default_port")]
    pub port: u16,

    pub database_url: String,

    // Trading core settings
    #[serde(default = "default_taker_fee_rate")]
    pub taker_fee_rate: Decimal,

    #[serde(default = "default_max_quantity")]
    pub max_quantity: Decimal,

    #[serde(default = "default_min_price")]
    pub min_price: Decimal,

    #[serde(default = "default_max_price")]
    pub max_price: Decimal,

    /// Fee sink and settlement counterparty account id.
    #[serde(default = "default_system_account_id")]
    pub system_account_id: String,

    /// Buffer size of the write-behind persistence queue.
    #[serde(default = "default_persist_queue_size")]
    pub persist_queue_size: usize,
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_taker_fee_rate() -> Decimal {
    Decimal::new(1, 2) // 0.01
}

fn default_max_quantity() -> Decimal {
    Decimal::from(1_000_000)
}

fn default_min_price() -> Decimal {
    Decimal::new(1, 2) // 0.01
}

fn default_max_price() -> Decimal {
    Decimal::new(99, 2) // 0.99
}

fn default_system_account_id() -> String {
    "SYSTEM".to_string()
}

fn default_persist_queue_size() -> usize {
    4096
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::default())
            .build()?;

        let app_config: AppConfig = config.try_deserialize()?;
        Ok(app_config)
    }

    pub fn trading(&self) -> TradingConfig {
        TradingConfig {
            taker_fee_rate: self.taker_fee_rate,
            max_quantity: self.max_quantity,
            min_price: self.min_price,
            max_price: self.max_price,
            system_account_id: self.system_account_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults() {
        assert_eq!(default_taker_fee_rate(), dec!(0.01));
        assert_eq!(default_min_price(), dec!(0.01));
        assert_eq!(default_max_price(), dec!(0.99));
        assert_eq!(default_max_quantity(), dec!(1000000));
    }
}
