// src/core/engine.rs
use crate::connectors::traits::ExchangeClient;
use crate::core::position::has_open_position;
use crate::error::TraderError;
use crate::types::{
    classify_label, Alert, AlertClass, BalanceSnapshot, OrderRecord, PriceMap, TradeDecision,
    QUOTE_ASSET,
};
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::info;

/// Fixed entry size in USDT; capped by the available USDT balance.
pub const TRADE_SIZE_USDT: i64 = 30;

/// Exit signals landing within this window of the entry are ignored, so a
/// position is never reversed on the same signal bar that opened it.
pub const CANDLE_INTERVAL_MINUTES: i64 = 30;

/// Position value above which an entry is considered already taken.
const ENTRY_GUARD_USDT: &str = "1.0";

/// Position value below which a position counts as already closed.
const EXIT_GUARD_USDT: &str = "0.05";

/// Classifies the alert and decides what, if anything, to trade. Pure over
/// its inputs; every read happened before this is called and every order
/// happens after, which is what keeps the policy testable offline.
pub fn decide(
    alert: &Alert,
    balances: &BalanceSnapshot,
    prices: &PriceMap,
    last_buy: Option<&OrderRecord>,
    now: DateTime<Utc>,
) -> TradeDecision {
    let base = alert.base_asset();
    let coin_balance = balances.free(base);

    match classify_label(&alert.label) {
        AlertClass::Entry => {
            // A held balance with no known price cannot be valued; never
            // treat a missing price as zero.
            let price = match prices.last(&alert.symbol).and_then(Decimal::from_f64) {
                Some(p) => p,
                None if coin_balance.is_zero() => Decimal::ZERO,
                None => {
                    return TradeDecision::NoOp {
                        reason: format!("price unknown for {}", alert.symbol),
                    }
                }
            };

            let entry_guard = Decimal::from_str(ENTRY_GUARD_USDT).unwrap();
            if has_open_position(coin_balance, price, entry_guard) {
                return TradeDecision::NoOp {
                    reason: format!("existing trade for {}", base),
                };
            }

            let available_usdt = balances.free(QUOTE_ASSET);
            let trade_size = Decimal::from(TRADE_SIZE_USDT).min(available_usdt);
            if trade_size > Decimal::ZERO {
                TradeDecision::EnterLong {
                    quote_amount: trade_size,
                }
            } else {
                TradeDecision::NoOp {
                    reason: "insufficient USDT balance".to_string(),
                }
            }
        }
        AlertClass::Exit => {
            let Some(last_buy) = last_buy else {
                return TradeDecision::NoOp {
                    reason: format!("no existing trade for {}", base),
                };
            };

            let Some(price) = prices.last(&alert.symbol).and_then(Decimal::from_f64) else {
                return TradeDecision::NoOp {
                    reason: format!("price unknown for {}", alert.symbol),
                };
            };

            let exit_guard = Decimal::from_str(EXIT_GUARD_USDT).unwrap();
            if !has_open_position(coin_balance, price, exit_guard) {
                return TradeDecision::NoOp {
                    reason: format!("position in {} already negligible", base),
                };
            }

            let entered_at = Utc
                .timestamp_millis_opt(last_buy.time_ms)
                .single()
                .unwrap_or(now);
            if now - entered_at < chrono::Duration::minutes(CANDLE_INTERVAL_MINUTES) {
                return TradeDecision::NoOp {
                    reason: format!("exit within same candle as entry for {}", alert.symbol),
                };
            }

            // Sell everything we hold, not a partial amount.
            TradeDecision::ExitLong {
                quantity: coin_balance,
            }
        }
        AlertClass::Unknown => TradeDecision::NoOp {
            reason: format!("unknown label: {}", alert.label),
        },
    }
}

/// Carries a decision out against the exchange. Returns the outcome line
/// that goes into the status report.
pub async fn execute(
    gateway: &dyn ExchangeClient,
    alert: &Alert,
    decision: &TradeDecision,
) -> Result<String, TraderError> {
    let base = alert.base_asset();
    match decision {
        TradeDecision::EnterLong { quote_amount } => {
            let order = gateway
                .place_market_buy(base, QUOTE_ASSET, *quote_amount)
                .await?;
            Ok(format!(
                "Buy order placed for {} {}: {} {}",
                quote_amount, QUOTE_ASSET, order.symbol, order.status
            ))
        }
        TradeDecision::ExitLong { quantity } => {
            let order = gateway
                .place_market_sell(base, QUOTE_ASSET, *quantity)
                .await?;
            Ok(format!(
                "Sell order placed for {} {}: {} {}",
                quantity, base, order.symbol, order.status
            ))
        }
        TradeDecision::NoOp { reason } => {
            info!("No action for {}: {}", alert.symbol, reason);
            Ok(format!("No action: {}", reason))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OrderResponse, Side, ORDER_STATUS_FILLED};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn alert(symbol: &str, label: &str) -> Alert {
        Alert {
            symbol: symbol.to_string(),
            label: label.to_string(),
        }
    }

    fn balances(entries: &[(&str, &str)]) -> BalanceSnapshot {
        let mut snapshot = BalanceSnapshot::default();
        for (asset, qty) in entries {
            snapshot.0.insert(asset.to_string(), d(qty));
        }
        snapshot
    }

    fn prices(entries: &[(&str, f64)]) -> PriceMap {
        let mut map = PriceMap::default();
        for (symbol, price) in entries {
            map.0.insert(symbol.to_string(), *price);
        }
        map
    }

    fn filled_buy_at(now: DateTime<Utc>, minutes_ago: i64) -> OrderRecord {
        OrderRecord {
            symbol: "MATICUSDT".to_string(),
            side: Side::Buy,
            status: ORDER_STATUS_FILLED.to_string(),
            time_ms: (now - chrono::Duration::minutes(minutes_ago)).timestamp_millis(),
            quantity: d("60"),
        }
    }

    #[test]
    fn unknown_label_is_a_noop() {
        let decision = decide(
            &alert("MATICUSDT", "Wave 5 Start"),
            &balances(&[("USDT", "100")]),
            &prices(&[("MATICUSDT", 0.5)]),
            None,
            Utc::now(),
        );
        assert!(matches!(decision, TradeDecision::NoOp { .. }));
    }

    #[test]
    fn entry_capped_at_fixed_trade_size() {
        // coinBalance 0, 50 USDT available, price 0.5 => buy 30 USDT worth
        let decision = decide(
            &alert("MATICUSDT", "Buy"),
            &balances(&[("USDT", "50")]),
            &prices(&[("MATICUSDT", 0.5)]),
            None,
            Utc::now(),
        );
        assert_eq!(
            decision,
            TradeDecision::EnterLong {
                quote_amount: d("30")
            }
        );
    }

    #[test]
    fn entry_spends_at_most_available_usdt() {
        let decision = decide(
            &alert("MATICUSDT", "Wave 3 Start"),
            &balances(&[("USDT", "12.5")]),
            &prices(&[("MATICUSDT", 0.5)]),
            None,
            Utc::now(),
        );
        assert_eq!(
            decision,
            TradeDecision::EnterLong {
                quote_amount: d("12.5")
            }
        );
    }

    #[test]
    fn entry_skipped_when_already_positioned() {
        // 120 MATIC * 0.5 = 60 USDT > 1.0 guard
        let decision = decide(
            &alert("MATICUSDT", "Buy"),
            &balances(&[("MATIC", "120"), ("USDT", "50")]),
            &prices(&[("MATICUSDT", 0.5)]),
            None,
            Utc::now(),
        );
        assert!(matches!(decision, TradeDecision::NoOp { .. }));
    }

    #[test]
    fn entry_skipped_without_usdt() {
        let decision = decide(
            &alert("MATICUSDT", "Buy"),
            &balances(&[]),
            &prices(&[("MATICUSDT", 0.5)]),
            None,
            Utc::now(),
        );
        assert_eq!(
            decision,
            TradeDecision::NoOp {
                reason: "insufficient USDT balance".to_string()
            }
        );
    }

    #[test]
    fn entry_with_held_coins_but_no_price_is_a_noop() {
        let decision = decide(
            &alert("MATICUSDT", "Buy"),
            &balances(&[("MATIC", "120"), ("USDT", "50")]),
            &prices(&[]),
            None,
            Utc::now(),
        );
        assert!(matches!(decision, TradeDecision::NoOp { .. }));
    }

    #[test]
    fn exit_requires_a_prior_filled_buy() {
        let decision = decide(
            &alert("MATICUSDT", "Wave 3 End"),
            &balances(&[("MATIC", "120")]),
            &prices(&[("MATICUSDT", 0.5)]),
            None,
            Utc::now(),
        );
        assert_eq!(
            decision,
            TradeDecision::NoOp {
                reason: "no existing trade for MATIC".to_string()
            }
        );
    }

    #[test]
    fn exit_within_candle_interval_is_held_back() {
        let now = Utc::now();
        let decision = decide(
            &alert("MATICUSDT", "Wave 3 End"),
            &balances(&[("MATIC", "120")]),
            &prices(&[("MATICUSDT", 0.5)]),
            Some(&filled_buy_at(now, 10)),
            now,
        );
        assert!(matches!(
            decision,
            TradeDecision::NoOp { ref reason } if reason.contains("same candle")
        ));
    }

    #[test]
    fn exit_sells_the_entire_balance() {
        let now = Utc::now();
        let decision = decide(
            &alert("MATICUSDT", "Wave A Start"),
            &balances(&[("MATIC", "120")]),
            &prices(&[("MATICUSDT", 0.5)]),
            Some(&filled_buy_at(now, 120)),
            now,
        );
        assert_eq!(decision, TradeDecision::ExitLong { quantity: d("120") });
    }

    #[test]
    fn exit_skipped_when_position_negligible() {
        // 0.08 MATIC * 0.5 = 0.04 USDT <= 0.05 guard
        let now = Utc::now();
        let decision = decide(
            &alert("MATICUSDT", "Wave 2 Start"),
            &balances(&[("MATIC", "0.08")]),
            &prices(&[("MATICUSDT", 0.5)]),
            Some(&filled_buy_at(now, 120)),
            now,
        );
        assert!(matches!(decision, TradeDecision::NoOp { .. }));
    }

    /// Gateway double that records write calls; reads are never expected.
    struct RecordingGateway {
        buys: AtomicUsize,
        sells: AtomicUsize,
    }

    impl RecordingGateway {
        fn new() -> Self {
            Self {
                buys: AtomicUsize::new(0),
                sells: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ExchangeClient for RecordingGateway {
        async fn get_balances(&self) -> Result<BalanceSnapshot, TraderError> {
            Ok(BalanceSnapshot::default())
        }
        async fn get_prices(&self) -> Result<PriceMap, TraderError> {
            Ok(PriceMap::default())
        }
        async fn order_history(&self, _symbol: &str) -> Result<Vec<OrderRecord>, TraderError> {
            Ok(Vec::new())
        }
        async fn place_market_buy(
            &self,
            base: &str,
            quote: &str,
            _quote_amount: Decimal,
        ) -> Result<OrderResponse, TraderError> {
            self.buys.fetch_add(1, Ordering::SeqCst);
            Ok(OrderResponse {
                id: "1".to_string(),
                symbol: format!("{}{}", base, quote),
                status: ORDER_STATUS_FILLED.to_string(),
            })
        }
        async fn place_market_sell(
            &self,
            base: &str,
            quote: &str,
            _quantity: Decimal,
        ) -> Result<OrderResponse, TraderError> {
            self.sells.fetch_add(1, Ordering::SeqCst);
            Ok(OrderResponse {
                id: "2".to_string(),
                symbol: format!("{}{}", base, quote),
                status: ORDER_STATUS_FILLED.to_string(),
            })
        }
    }

    #[tokio::test]
    async fn noop_decisions_never_touch_order_endpoints() {
        let gateway = RecordingGateway::new();
        let a = alert("MATICUSDT", "whatever");
        let decision = TradeDecision::NoOp {
            reason: "unknown label: whatever".to_string(),
        };
        let line = execute(&gateway, &a, &decision).await.unwrap();
        assert!(line.contains("No action"));
        assert_eq!(gateway.buys.load(Ordering::SeqCst), 0);
        assert_eq!(gateway.sells.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn entry_decision_places_exactly_one_buy() {
        let gateway = RecordingGateway::new();
        let a = alert("MATICUSDT", "Buy");
        let decision = TradeDecision::EnterLong {
            quote_amount: d("30"),
        };
        execute(&gateway, &a, &decision).await.unwrap();
        assert_eq!(gateway.buys.load(Ordering::SeqCst), 1);
        assert_eq!(gateway.sells.load(Ordering::SeqCst), 0);
    }
}
