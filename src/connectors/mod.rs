pub mod binance;
pub mod telegram;
pub mod traits;
