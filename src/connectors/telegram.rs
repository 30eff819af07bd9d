// src/connectors/telegram.rs
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

/// Delivery is best-effort: each message is retried with exponential
/// backoff and dropped after the budget runs out. A lost status line must
/// never abort a trading invocation.
const MAX_SEND_RETRIES: u32 = 10;

/// Relays plain-text status lines to a Telegram channel via the Bot API.
pub struct TelegramNotifier {
    http_client: Client,
    bot_token: String,
    chat_id: i64,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_id: i64) -> Self {
        Self {
            http_client: Client::new(),
            bot_token,
            chat_id,
        }
    }

    pub async fn send(&self, text: &str) {
        let url = format!(
            "https://api.telegram.org/bot{}/sendMessage",
            self.bot_token
        );
        let body = json!({ "chat_id": self.chat_id, "text": text });

        for attempt in 0..MAX_SEND_RETRIES {
            let result = self
                .http_client
                .post(&url)
                .json(&body)
                .send()
                .await
                .and_then(|r| r.error_for_status());

            match result {
                Ok(_) => return,
                Err(e) => {
                    warn!(
                        "Error sending message to Telegram: {}. Retrying {}/{}",
                        e,
                        attempt + 1,
                        MAX_SEND_RETRIES
                    );
                    tokio::time::sleep(Duration::from_secs(1u64 << attempt.min(6))).await;
                }
            }
        }
        info!(
            "Failed to send message to Telegram after {} retries",
            MAX_SEND_RETRIES
        );
    }
}
