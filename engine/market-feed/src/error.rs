//! Error types for the market feed

use thiserror::Error;

/// Result type for market feed operations
pub type Result<T> = std::result::Result<T, FeedError>;

/// Errors that can occur while simulating or distributing quotes
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Instrument not found: {0}")]
    InstrumentNotFound(String),

    #[error("Quote for {symbol} would become non-positive (bid {bid}, ask {ask})")]
    NonPositiveQuote { symbol: String, bid: String, ask: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
