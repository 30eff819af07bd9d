// src/types.rs
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Quote currency every alert symbol is expected to end with.
pub const QUOTE_ASSET: &str = "USDT";

/// Binance prefixes locked-staking mirror assets with "LD"; they are not tradable.
pub const LOCKED_STAKING_PREFIX: &str = "LD";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

/// Incoming webhook payload from the charting service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Alert {
    pub symbol: String,
    pub label: String,
}

impl Alert {
    /// Base asset name: the symbol with the quote suffix stripped, if present.
    /// "MATICUSDT" -> "MATIC"; a symbol without the suffix is used as-is.
    pub fn base_asset(&self) -> &str {
        self.symbol
            .strip_suffix(QUOTE_ASSET)
            .unwrap_or(&self.symbol)
    }
}

/// What an alert label asks us to do. Labels outside the fixed vocabulary
/// are valid input that maps to `Unknown` (logged no-op, never an error).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertClass {
    Entry,
    Exit,
    Unknown,
}

pub fn classify_label(label: &str) -> AlertClass {
    match label {
        "Buy" | "Wave 3 Start" => AlertClass::Entry,
        "Wave 3 End" | "Wave 2 Start" | "Wave 4 Start" | "Wave A Start" | "Wave C Start" => {
            AlertClass::Exit
        }
        _ => AlertClass::Unknown,
    }
}

/// Free balances per asset, already filtered to non-dust, non-staking assets.
/// A missing key means zero balance.
#[derive(Debug, Clone, Default)]
pub struct BalanceSnapshot(pub HashMap<String, Decimal>);

impl BalanceSnapshot {
    pub fn free(&self, asset: &str) -> Decimal {
        self.0.get(asset).copied().unwrap_or(Decimal::ZERO)
    }

    /// One "<qty> <asset>" line per retained asset, for status reports.
    pub fn report(&self) -> String {
        let mut lines: Vec<_> = self
            .0
            .iter()
            .map(|(asset, qty)| format!("{} {}", qty, asset))
            .collect();
        lines.sort();
        lines.join("\n")
    }
}

/// Last prices keyed by trading-pair symbol ("MATICUSDT"). A symbol absent
/// from the map means "price unknown", never zero.
#[derive(Debug, Clone, Default)]
pub struct PriceMap(pub HashMap<String, f64>);

impl PriceMap {
    pub fn last(&self, symbol: &str) -> Option<f64> {
        self.0.get(symbol).copied()
    }
}

/// LOT_SIZE constraints for one symbol, from exchange trading rules.
#[derive(Debug, Clone, PartialEq)]
pub struct LotSizeRule {
    pub step_size: Decimal,
    pub min_qty: Decimal,
    pub max_qty: Decimal,
}

pub const ORDER_STATUS_FILLED: &str = "FILLED";

/// A historical order as reported by the exchange.
#[derive(Debug, Clone)]
pub struct OrderRecord {
    pub symbol: String,
    pub side: Side,
    pub status: String,
    /// Epoch milliseconds, as Binance reports them.
    pub time_ms: i64,
    pub quantity: Decimal,
}

/// Exchange acknowledgement of a submitted order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResponse {
    pub id: String,
    pub symbol: String,
    pub status: String,
}

/// Outcome of the decision engine for one alert, before any order is sent.
#[derive(Debug, Clone, PartialEq)]
pub enum TradeDecision {
    /// Market-buy for this many USDT worth of the base asset.
    EnterLong { quote_amount: Decimal },
    /// Market-sell this exact base-asset quantity (the full held balance).
    ExitLong { quantity: Decimal },
    NoOp { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_asset_strips_quote_suffix() {
        let alert = Alert {
            symbol: "MATICUSDT".to_string(),
            label: "Buy".to_string(),
        };
        assert_eq!(alert.base_asset(), "MATIC");
    }

    #[test]
    fn base_asset_without_suffix_is_kept() {
        let alert = Alert {
            symbol: "MATICBTC".to_string(),
            label: "Buy".to_string(),
        };
        assert_eq!(alert.base_asset(), "MATICBTC");
    }

    #[test]
    fn label_vocabulary() {
        assert_eq!(classify_label("Buy"), AlertClass::Entry);
        assert_eq!(classify_label("Wave 3 Start"), AlertClass::Entry);
        for exit in [
            "Wave 3 End",
            "Wave 2 Start",
            "Wave 4 Start",
            "Wave A Start",
            "Wave C Start",
        ] {
            assert_eq!(classify_label(exit), AlertClass::Exit);
        }
        assert_eq!(classify_label("Wave 5 Start"), AlertClass::Unknown);
        assert_eq!(classify_label(""), AlertClass::Unknown);
    }

    #[test]
    fn missing_balance_is_zero() {
        let snapshot = BalanceSnapshot::default();
        assert_eq!(snapshot.free("MATIC"), Decimal::ZERO);
    }

    #[test]
    fn missing_price_is_unknown() {
        let prices = PriceMap::default();
        assert_eq!(prices.last("MATICUSDT"), None);
    }
}
