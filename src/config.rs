// src/config.rs

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

/// Runtime configuration, sourced from the process environment only.
/// Credentials have no fallback defaults; missing variables fail startup.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub binance_api_key: String,
    pub binance_secret_key: String,
    pub bot_token: String,
    /// Telegram channel the status reports go to.
    pub tele_group_id: i64,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        // try_parsing so TELE_GROUP_ID ("-100123...") deserializes as i64
        let builder = Config::builder().add_source(Environment::default().try_parsing(true));

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("BINANCE_API_KEY", &self.binance_api_key),
            ("BINANCE_SECRET_KEY", &self.binance_secret_key),
            ("BOT_TOKEN", &self.bot_token),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Message(format!("{} must not be empty", name)));
            }
        }
        Ok(())
    }
}
