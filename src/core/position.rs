// src/core/position.rs
//! Derives position state from what the exchange account already knows:
//! current balances answer "do we hold this", order history answers
//! "when did we last enter".

use crate::types::{OrderRecord, Side, ORDER_STATUS_FILLED};
use rust_decimal::Decimal;

/// True iff the held balance is worth more than `threshold_usdt` at the
/// given price. Callers use two thresholds: 1.0 USDT as the entry guard
/// ("already positioned, skip buy") and 0.05 USDT as the exit guard
/// ("position still worth selling").
pub fn has_open_position(coin_balance: Decimal, price: Decimal, threshold_usdt: Decimal) -> bool {
    coin_balance * price > threshold_usdt
}

/// Most recent filled buy from an already-fetched order history, or `None`
/// if the symbol was never bought. Sorted descending by time so equal-time
/// entries still yield the strictly latest fill first.
pub fn last_filled_buy(mut orders: Vec<OrderRecord>) -> Option<OrderRecord> {
    orders.sort_by(|a, b| b.time_ms.cmp(&a.time_ms));
    orders
        .into_iter()
        .find(|o| o.status == ORDER_STATUS_FILLED && o.side == Side::Buy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn order(side: Side, status: &str, time_ms: i64) -> OrderRecord {
        OrderRecord {
            symbol: "MATICUSDT".to_string(),
            side,
            status: status.to_string(),
            time_ms,
            quantity: Decimal::from(10),
        }
    }

    #[test]
    fn position_threshold_is_strict() {
        assert!(has_open_position(d("4"), d("0.5"), Decimal::ONE));
        assert!(!has_open_position(d("2"), d("0.5"), Decimal::ONE)); // exactly 1.0
        assert!(!has_open_position(Decimal::ZERO, d("0.5"), Decimal::ONE));
    }

    #[test]
    fn exit_guard_uses_smaller_threshold() {
        // 0.08 USDT of MATIC: below entry guard, above exit guard
        let value_balance = d("0.16");
        let price = d("0.5");
        assert!(!has_open_position(value_balance, price, Decimal::ONE));
        assert!(has_open_position(value_balance, price, d("0.05")));
    }

    #[test]
    fn latest_filled_buy_wins() {
        let history = vec![
            order(Side::Buy, ORDER_STATUS_FILLED, 100),
            order(Side::Buy, ORDER_STATUS_FILLED, 300),
            order(Side::Sell, ORDER_STATUS_FILLED, 400),
            order(Side::Buy, "CANCELED", 500),
        ];
        let found = last_filled_buy(history).unwrap();
        assert_eq!(found.time_ms, 300);
        assert_eq!(found.side, Side::Buy);
    }

    #[test]
    fn no_filled_buy_means_none() {
        let history = vec![
            order(Side::Buy, "CANCELED", 100),
            order(Side::Sell, ORDER_STATUS_FILLED, 200),
        ];
        assert!(last_filled_buy(history).is_none());
        assert!(last_filled_buy(Vec::new()).is_none());
    }
}
