pub mod money;
pub mod pii;
pub mod models;

pub use money::{
    parse_amount, round_money, Currency, ExchangeRate, DEFAULT_EXCHANGE_RATE, MAX_AMOUNT, MAX_EXCHANGE_RATE,
    MIN_EXCHANGE_RATE,
};
pub use pii::Masked;
