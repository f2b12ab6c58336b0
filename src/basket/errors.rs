//! Basket-specific error types

use thiserror::Error;

/// Errors that can occur in grid basket operations
#[derive(Error, Debug, Clone)]
pub enum BasketError {
    #[error("Invalid basket configuration: {0}")]
    InvalidConfig(String),

    #[error("Leverage {requested} is too low, minimum is {min}")]
    LeverageTooLow { requested: u32, min: u32 },

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("Entry price unavailable for {0}")]
    MissingEntryPrice(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("JSON parse error: {0}")]
    JsonParse(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Settings error: {0}")]
    Settings(String),
}

impl From<serde_json::Error> for BasketError {
    fn from(err: serde_json::Error) -> Self {
        BasketError::JsonParse(err.to_string())
    }
}

impl From<std::io::Error> for BasketError {
    fn from(err: std::io::Error) -> Self {
        BasketError::Io(err.to_string())
    }
}

impl From<config::ConfigError> for BasketError {
    fn from(err: config::ConfigError) -> Self {
        BasketError::Settings(err.to_string())
    }
}

/// Result type for basket operations
pub type BasketResult<T> = std::result::Result<T, BasketError>;
