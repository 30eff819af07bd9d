// src/error.rs
use thiserror::Error;

/// Typed failures surfaced to the invocation boundary. The webhook handler
/// decides what to do with them; nothing in here terminates the process.
#[derive(Debug, Error)]
pub enum TraderError {
    #[error("exchange request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to sign request: {0}")]
    Signing(String),

    #[error("unexpected exchange response: {0}")]
    BadResponse(String),

    /// A read (balances, prices) kept failing past the retry budget.
    #[error("{what} unavailable after {attempts} attempts: {source}")]
    ReadRetriesExhausted {
        what: &'static str,
        attempts: u32,
        #[source]
        source: Box<TraderError>,
    },

    /// Order submission failed. Never retried: resubmitting a market order
    /// on a transient failure risks a double fill.
    #[error("order submission for {symbol} failed: {source}")]
    OrderRejected {
        symbol: String,
        #[source]
        source: Box<TraderError>,
    },

    /// Order-history fetch failed (exit decisions cannot proceed without it).
    #[error("order history for {symbol} unavailable: {source}")]
    OrderHistory {
        symbol: String,
        #[source]
        source: Box<TraderError>,
    },

    /// No last price known for a symbol we must trade.
    #[error("no price available for {symbol}")]
    PriceUnavailable { symbol: String },
}
