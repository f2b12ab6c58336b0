use std::collections::HashMap;

use config::{Config, Environment, File};
pub use config::ConfigError;
use serde::Deserialize;

use crate::basket::BasketParams;

/// Main configuration struct
#[derive(Debug, Deserialize)]
pub struct Settings {
    /// Which symbols to trade and how the bot drives them
    #[serde(default)]
    pub bot: BotSettings,
    /// Strategy parameters shared by every basket
    #[serde(default)]
    pub basket: BasketParams,
    /// Simulated venue
    #[serde(default)]
    pub paper: PaperSettings,
    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize)]
pub struct BotSettings {
    /// Full symbols, e.g. "ADA/USDT:USDT"
    #[serde(default)]
    pub symbols: Vec<String>,
    /// Comma-separated coin shorthand, e.g. "ADA,XRP" for USDT perps
    #[serde(default)]
    pub coins: String,
    /// Leverage applied to every basket at init
    #[serde(default = "default_leverage")]
    pub leverage: Option<u32>,
    /// Exit check period per basket
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Pause between starting two baskets
    #[serde(default = "default_create_delay_ms")]
    pub create_delay_ms: u64,
    /// Record grid fills and publish diagnostic tables
    #[serde(default)]
    pub debug: bool,
    /// Disable periodic status reporting
    #[serde(default)]
    pub backtest: bool,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            symbols: Vec::new(),
            coins: String::new(),
            leverage: default_leverage(),
            tick_interval_ms: default_tick_interval_ms(),
            create_delay_ms: default_create_delay_ms(),
            debug: false,
            backtest: false,
        }
    }
}

fn default_leverage() -> Option<u32> {
    Some(30)
}

fn default_tick_interval_ms() -> u64 {
    60_000
}

fn default_create_delay_ms() -> u64 {
    1_000
}

#[derive(Debug, Deserialize)]
pub struct PaperSettings {
    /// Starting price per symbol; unlisted symbols start at `default_price`
    #[serde(default)]
    pub start_prices: HashMap<String, f64>,
    #[serde(default = "default_start_price")]
    pub default_price: f64,
    /// Full bid/ask spread in percent
    #[serde(default = "default_spread_percent")]
    pub spread_percent: f64,
    /// Largest random move per step in percent
    #[serde(default = "default_volatility_percent")]
    pub volatility_percent: f64,
    #[serde(default = "default_step_ms")]
    pub step_ms: u64,
}

impl Default for PaperSettings {
    fn default() -> Self {
        Self {
            start_prices: HashMap::new(),
            default_price: default_start_price(),
            spread_percent: default_spread_percent(),
            volatility_percent: default_volatility_percent(),
            step_ms: default_step_ms(),
        }
    }
}

fn default_start_price() -> f64 {
    1.0
}

fn default_spread_percent() -> f64 {
    0.05
}

fn default_volatility_percent() -> f64 {
    0.5
}

fn default_step_ms() -> u64 {
    1_000
}

#[derive(Debug, Deserialize)]
pub struct LogConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Enable local dashboard server
    #[serde(default = "default_server_enabled")]
    pub enabled: bool,
    /// Server port (default 3000)
    #[serde(default = "default_server_port")]
    pub port: u16,
    /// Server host (default 127.0.0.1)
    #[serde(default = "default_server_host")]
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: default_server_enabled(),
            port: default_server_port(),
            host: default_server_host(),
        }
    }
}

fn default_server_enabled() -> bool {
    false
}

fn default_server_port() -> u16 {
    3000
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

/// `APP__`-prefixed overrides, e.g. APP__BASKET__SIZE_USD=25 or
/// APP__BOT__SYMBOLS="ADA/USDT:USDT,XRP/USDT:USDT"
fn env_source() -> Environment {
    Environment::with_prefix("APP")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("bot.symbols")
}

impl Settings {
    /// Load settings from a configuration file
    pub fn new(config_path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(config_path))
            .add_source(env_source())
            .build()?;

        s.try_deserialize()
    }

    /// Starting price of a symbol on the paper venue. Keys match
    /// case-insensitively.
    pub fn start_price(&self, symbol: &str) -> f64 {
        self.paper
            .start_prices
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(symbol))
            .map(|(_, price)| *price)
            .unwrap_or(self.paper.default_price)
    }
}
