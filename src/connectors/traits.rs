use crate::error::TraderError;
use crate::types::{BalanceSnapshot, OrderRecord, OrderResponse, PriceMap};
use async_trait::async_trait;
use rust_decimal::Decimal;

#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Free balances, filtered to assets worth holding a report line for.
    /// Reads retry internally up to the client's budget.
    async fn get_balances(&self) -> Result<BalanceSnapshot, TraderError>;

    /// Last price for every listed symbol. Same retry budget as balances.
    async fn get_prices(&self) -> Result<PriceMap, TraderError>;

    /// All historical orders for one symbol, no retry.
    async fn order_history(&self, symbol: &str) -> Result<Vec<OrderRecord>, TraderError>;

    /// Market buy sized in the quote currency; the client converts to a
    /// base quantity at the current price and quantizes it. No retry.
    async fn place_market_buy(
        &self,
        base: &str,
        quote: &str,
        quote_amount: Decimal,
    ) -> Result<OrderResponse, TraderError>;

    /// Market sell of an exact base quantity, submitted verbatim. No retry.
    async fn place_market_sell(
        &self,
        base: &str,
        quote: &str,
        quantity: Decimal,
    ) -> Result<OrderResponse, TraderError>;
}
