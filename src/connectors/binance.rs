// src/connectors/binance.rs
use crate::connectors::traits::ExchangeClient;
use crate::error::TraderError;
use crate::types::{
    BalanceSnapshot, LotSizeRule, OrderRecord, OrderResponse, PriceMap, Side,
    LOCKED_STAKING_PREFIX, QUOTE_ASSET,
};
use crate::utils::precision::quantize;
use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::Sha256;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

type HmacSha256 = Hmac<Sha256>;

/// Reads are retried with a fixed delay; exhausting the budget is fatal for
/// the invocation. Writes are never retried (double-fill risk).
const MAX_READ_RETRIES: u32 = 10;
const READ_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Assets whose USDT-equivalent free balance is at or below this are dust.
const DUST_THRESHOLD_USDT: &str = "0.5";

pub struct BinanceClient {
    api_key: String,
    secret_key: String,
    http_client: Client,
    base_rest_url: String,
}

// ---- Wire types ----

#[derive(Debug, Deserialize)]
struct RawBalance {
    asset: String,
    free: String,
}

#[derive(Debug, Deserialize)]
struct AccountInfo {
    balances: Vec<RawBalance>,
}

#[derive(Debug, Deserialize)]
struct SymbolPrice {
    symbol: String,
    price: String,
}

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
struct SymbolInfo {
    symbol: String,
    filters: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct BinanceOrder {
    symbol: String,
    side: String,
    status: String,
    time: i64,
    #[serde(rename = "executedQty")]
    executed_qty: String,
}

#[derive(Debug, Deserialize)]
struct BinanceOrderResponse {
    #[serde(rename = "orderId")]
    order_id: u64,
    symbol: String,
    status: String,
}

impl BinanceClient {
    pub fn new(api_key: String, secret_key: String) -> Self {
        Self {
            api_key,
            secret_key,
            http_client: Client::new(),
            base_rest_url: "https://api.binance.com".to_string(),
        }
    }

    fn sign_and_build_query(&self, params: Vec<(&str, String)>) -> Result<String, TraderError> {
        let mut params = params;
        let timestamp = Utc::now().timestamp_millis().to_string();
        params.push(("timestamp", timestamp));

        let query_string = serde_urlencoded::to_string(&params)
            .map_err(|e| TraderError::Signing(e.to_string()))?;

        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .map_err(|_| TraderError::Signing("invalid secret key length".to_string()))?;
        mac.update(query_string.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        Ok(format!("{}&signature={}", query_string, signature))
    }

    async fn send_signed_request<T: for<'de> Deserialize<'de>>(
        &self,
        method: Method,
        endpoint: &str,
        params: Vec<(&str, String)>,
    ) -> Result<T, TraderError> {
        let full_query = self.sign_and_build_query(params)?;
        let url = format!("{}{}?{}", self.base_rest_url, endpoint, full_query);

        let response = self
            .http_client
            .request(method, &url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json::<T>().await?)
    }

    async fn fetch_account(&self) -> Result<AccountInfo, TraderError> {
        self.send_signed_request(Method::GET, "/api/v3/account", vec![])
            .await
    }

    async fn fetch_price_list(&self) -> Result<Vec<SymbolPrice>, TraderError> {
        let url = format!("{}/api/v3/ticker/price", self.base_rest_url);
        let resp = self
            .http_client
            .get(&url)
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json::<Vec<SymbolPrice>>().await?)
    }

    /// Single-symbol last price, used right before submitting a buy.
    /// Not retried: this sits on the order path.
    async fn fetch_symbol_price(&self, symbol: &str) -> Result<Decimal, TraderError> {
        let url = format!(
            "{}/api/v3/ticker/price?symbol={}",
            self.base_rest_url, symbol
        );
        let resp: SymbolPrice = self
            .http_client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Decimal::from_str(&resp.price)
            .map_err(|e| TraderError::BadResponse(format!("price for {}: {}", symbol, e)))
    }

    /// LOT_SIZE filter for one symbol. `None` when the exchange reports no
    /// such filter; the order quantity then passes through unquantized.
    async fn fetch_lot_size_rule(&self, symbol: &str) -> Result<Option<LotSizeRule>, TraderError> {
        let url = format!(
            "{}/api/v3/exchangeInfo?symbol={}",
            self.base_rest_url, symbol
        );
        let info: ExchangeInfo = self
            .http_client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let Some(symbol_info) = info.symbols.into_iter().find(|s| s.symbol == symbol) else {
            return Ok(None);
        };

        for filter in &symbol_info.filters {
            if filter.get("filterType").and_then(|v| v.as_str()) == Some("LOT_SIZE") {
                let field = |name: &str| -> Result<Decimal, TraderError> {
                    let raw = filter.get(name).and_then(|v| v.as_str()).ok_or_else(|| {
                        TraderError::BadResponse(format!("LOT_SIZE missing {}", name))
                    })?;
                    Decimal::from_str(raw).map_err(|e| {
                        TraderError::BadResponse(format!("LOT_SIZE {}: {}", name, e))
                    })
                };
                return Ok(Some(LotSizeRule {
                    step_size: field("stepSize")?,
                    min_qty: field("minQty")?,
                    max_qty: field("maxQty")?,
                }));
            }
        }
        Ok(None)
    }

    async fn retry_read<T, F, Fut>(
        &self,
        what: &'static str,
        mut op: F,
    ) -> Result<T, TraderError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, TraderError>>,
    {
        let mut last_err = None;
        for attempt in 1..=MAX_READ_RETRIES {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(
                        "Error getting {} (attempt {}/{}): {}",
                        what, attempt, MAX_READ_RETRIES, e
                    );
                    last_err = Some(e);
                    if attempt < MAX_READ_RETRIES {
                        tokio::time::sleep(READ_RETRY_DELAY).await;
                    }
                }
            }
        }
        Err(TraderError::ReadRetriesExhausted {
            what,
            attempts: MAX_READ_RETRIES,
            source: Box::new(last_err.unwrap_or_else(|| {
                TraderError::BadResponse("retry loop without attempts".to_string())
            })),
        })
    }

    async fn submit_market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
    ) -> Result<OrderResponse, TraderError> {
        let side_str = match side {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        };

        let params = vec![
            ("symbol", symbol.to_string()),
            ("side", side_str.to_string()),
            ("type", "MARKET".to_string()),
            ("quantity", quantity.to_string()),
        ];

        info!("Sending order: {} {} {}", side_str, quantity, symbol);

        let resp: BinanceOrderResponse = self
            .send_signed_request(Method::POST, "/api/v3/order", params)
            .await
            .map_err(|e| TraderError::OrderRejected {
                symbol: symbol.to_string(),
                source: Box::new(e),
            })?;

        info!(
            "Market {} order placed: id={} status={}",
            side_str, resp.order_id, resp.status
        );

        Ok(OrderResponse {
            id: resp.order_id.to_string(),
            symbol: resp.symbol,
            status: resp.status,
        })
    }
}

/// Retains only assets worth reporting: nonzero free amount, not a
/// locked-staking mirror, and a USDT-equivalent value above the dust
/// threshold. Assets with no `<ASSET>USDT` price are skipped, not fatal.
fn filter_balances(raw: Vec<RawBalance>, prices: &PriceMap) -> BalanceSnapshot {
    let dust = Decimal::from_str(DUST_THRESHOLD_USDT).unwrap_or(Decimal::ONE);
    let mut retained = BalanceSnapshot::default();

    for balance in raw {
        if balance.asset.starts_with(LOCKED_STAKING_PREFIX) {
            continue;
        }
        let free = match Decimal::from_str(&balance.free) {
            Ok(v) => v,
            Err(e) => {
                warn!("Error parsing balance for {}: {}", balance.asset, e);
                continue;
            }
        };
        if free.is_zero() {
            continue;
        }

        let usdt_value = if balance.asset == QUOTE_ASSET {
            free
        } else {
            let pair = format!("{}{}", balance.asset, QUOTE_ASSET);
            let Some(price) = prices.last(&pair).and_then(Decimal::from_f64) else {
                warn!("Price not found for {}", pair);
                continue;
            };
            free * price
        };

        if usdt_value > dust {
            retained.0.insert(balance.asset, free);
        }
    }
    retained
}

#[async_trait]
impl ExchangeClient for BinanceClient {
    async fn get_balances(&self) -> Result<BalanceSnapshot, TraderError> {
        let account = self
            .retry_read("account balances", || self.fetch_account())
            .await?;
        let prices = self.get_prices().await?;
        Ok(filter_balances(account.balances, &prices))
    }

    async fn get_prices(&self) -> Result<PriceMap, TraderError> {
        let listed = self.retry_read("prices", || self.fetch_price_list()).await?;

        let mut prices = PriceMap::default();
        for entry in listed {
            match entry.price.parse::<f64>() {
                Ok(price) => {
                    prices.0.insert(entry.symbol, price);
                }
                Err(e) => warn!("Error parsing price for {}: {}", entry.symbol, e),
            }
        }
        Ok(prices)
    }

    async fn order_history(&self, symbol: &str) -> Result<Vec<OrderRecord>, TraderError> {
        let params = vec![("symbol", symbol.to_string())];
        let orders: Vec<BinanceOrder> = self
            .send_signed_request(Method::GET, "/api/v3/allOrders", params)
            .await
            .map_err(|e| TraderError::OrderHistory {
                symbol: symbol.to_string(),
                source: Box::new(e),
            })?;

        Ok(orders
            .into_iter()
            .map(|o| OrderRecord {
                symbol: o.symbol,
                side: if o.side == "BUY" { Side::Buy } else { Side::Sell },
                status: o.status,
                time_ms: o.time,
                quantity: Decimal::from_str(&o.executed_qty).unwrap_or(Decimal::ZERO),
            })
            .collect())
    }

    async fn place_market_buy(
        &self,
        base: &str,
        quote: &str,
        quote_amount: Decimal,
    ) -> Result<OrderResponse, TraderError> {
        let symbol = format!("{}{}", base, quote);

        let price = self.fetch_symbol_price(&symbol).await?;
        if price.is_zero() {
            return Err(TraderError::PriceUnavailable { symbol });
        }
        let raw_qty = quote_amount / price;
        info!(
            "Price {}/{}: {}. About to buy {} {} for {} {}",
            base, quote, price, raw_qty, base, quote_amount, quote
        );

        let rule = self.fetch_lot_size_rule(&symbol).await?;
        if rule.is_none() {
            warn!("No LOT_SIZE filter for {}, submitting unquantized", symbol);
        }
        let quantity = quantize(raw_qty, rule.as_ref());

        self.submit_market_order(&symbol, Side::Buy, quantity).await
    }

    async fn place_market_sell(
        &self,
        base: &str,
        quote: &str,
        quantity: Decimal,
    ) -> Result<OrderResponse, TraderError> {
        let symbol = format!("{}{}", base, quote);
        self.submit_market_order(&symbol, Side::Sell, quantity).await
    }
}
