// src/server.rs
use crate::config::AppConfig;
use crate::connectors::binance::BinanceClient;
use crate::connectors::telegram::TelegramNotifier;
use crate::connectors::traits::ExchangeClient;
use crate::core::engine::{decide, execute};
use crate::core::locks::SymbolLocks;
use crate::core::position::last_filled_buy;
use crate::error::TraderError;
use crate::types::{classify_label, Alert, AlertClass};
use crate::utils::ip::public_ip;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info};

pub struct AppState {
    pub config: AppConfig,
    pub locks: SymbolLocks,
    pub http_client: reqwest::Client,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            locks: SymbolLocks::new(),
            http_client: reqwest::Client::new(),
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/alert", post(handle_alert))
        .with_state(state)
}

async fn handle_alert(
    State(state): State<Arc<AppState>>,
    body: String,
) -> (StatusCode, String) {
    let alert: Alert = match serde_json::from_str(&body) {
        Ok(alert) => alert,
        Err(e) => {
            error!("Error parsing alert JSON: {}, body: {}", e, body);
            return (StatusCode::BAD_REQUEST, format!("bad alert payload: {}", e));
        }
    };

    let notifier = TelegramNotifier::new(
        state.config.bot_token.clone(),
        state.config.tele_group_id,
    );

    match run_invocation(&state, &notifier, &alert, &body).await {
        // Echo the accepted body back, as the webhook sender expects.
        Ok(()) => (StatusCode::OK, body),
        Err(e) => {
            error!("Invocation failed for {}: {:#}", alert.symbol, e);
            notifier.send(&format!("Invocation failed: {}", e)).await;
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// One full read-decide-act-report cycle for an alert. Held under the
/// symbol's advisory lock so a second delivery for the same symbol cannot
/// race this one between the position check and the order.
async fn run_invocation(
    state: &AppState,
    notifier: &TelegramNotifier,
    alert: &Alert,
    raw_body: &str,
) -> Result<(), TraderError> {
    if let Some(ip) = public_ip(&state.http_client).await {
        notifier.send(&format!("Egress IP: {}", ip)).await;
    }
    notifier
        .send(&format!(
            "[UPDATE] At {}, alert received:\n{}",
            Utc::now().to_rfc3339(),
            raw_body
        ))
        .await;

    let lock = state.locks.for_symbol(&alert.symbol);
    let _guard = lock.lock().await;

    // Gateway lives for exactly one invocation; no state crosses webhooks.
    let gateway = BinanceClient::new(
        state.config.binance_api_key.clone(),
        state.config.binance_secret_key.clone(),
    );

    let balances_before = gateway.get_balances().await?;
    notifier
        .send(&format!("<Before> Balances:\n{}", balances_before.report()))
        .await;

    let prices = gateway.get_prices().await?;

    // Order history is a signed call; only exits need it.
    let last_buy = match classify_label(&alert.label) {
        AlertClass::Exit => last_filled_buy(gateway.order_history(&alert.symbol).await?),
        _ => None,
    };

    info!("Processing alert: {:?}", alert);
    let decision = decide(alert, &balances_before, &prices, last_buy.as_ref(), Utc::now());
    let outcome = execute(&gateway, alert, &decision).await?;
    notifier.send(&outcome).await;

    let balances_after = gateway.get_balances().await?;
    notifier
        .send(&format!("<After> Balances:\n{}", balances_after.report()))
        .await;

    Ok(())
}
