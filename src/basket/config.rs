//! Grid basket configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::errors::{BasketError, BasketResult};

/// Lowest leverage a basket accepts
pub const MIN_LEVERAGE: u32 = 15;

/// Peak round size (USD) above which the per-step grid report is published
pub const GRID_SIZE_ALERT_USD: f64 = 5555.0;

/// Strategy parameters shared by every basket of a bot, as written in the
/// settings file. `max_drawdown_percent` is a percent here; [`BasketConfig`]
/// stores it as a fraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasketParams {
    #[serde(default = "default_size_usd")]
    pub size_usd: f64,
    #[serde(default = "default_grid_step_percent")]
    pub grid_step_percent: f64,
    #[serde(default = "default_tp_percent")]
    pub tp_percent: f64,
    #[serde(default = "default_size_factor")]
    pub size_factor: f64,
    #[serde(default = "default_max_drawdown_percent")]
    pub max_drawdown_percent: f64,
}

fn default_size_usd() -> f64 {
    10.0
}

fn default_grid_step_percent() -> f64 {
    10.0
}

fn default_tp_percent() -> f64 {
    2.0
}

fn default_size_factor() -> f64 {
    1.0
}

fn default_max_drawdown_percent() -> f64 {
    400_000.0
}

impl Default for BasketParams {
    fn default() -> Self {
        Self {
            size_usd: default_size_usd(),
            grid_step_percent: default_grid_step_percent(),
            tp_percent: default_tp_percent(),
            size_factor: default_size_factor(),
            max_drawdown_percent: default_max_drawdown_percent(),
        }
    }
}

/// Immutable configuration of one basket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasketConfig {
    /// Symbol traded by this basket (e.g., "ADA/USDT:USDT")
    pub symbol: String,

    /// Base order notional in quote currency
    pub size_usd: f64,

    /// Adverse move in percent before the next grid entry
    pub grid_step_percent: f64,

    /// Favourable move in percent from entry that closes the round
    pub tp_percent: f64,

    /// Multiplier applied to the current position size for the next entry.
    /// 1.0 doubles the position each step, 0.5 grows it by half.
    pub size_factor: f64,

    /// Tolerated unrealised loss as a fraction of `size_usd`
    pub max_drawdown: f64,

    /// Leverage applied during init
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leverage: Option<u32>,

    /// Record grid fills and publish diagnostic tables
    #[serde(default)]
    pub debug: bool,

    /// Simulation mode: no periodic status reporting
    #[serde(default)]
    pub backtest: bool,

    /// Interval of the recurring status snapshot
    #[serde(default = "default_status_interval", with = "millis")]
    pub status_interval: Duration,

    /// Delay before the first round when starting flat
    #[serde(default = "default_new_round_delay", with = "millis")]
    pub new_round_delay: Duration,

    /// Delay before rebuilding the grid order after a restart with a position
    #[serde(default = "default_rebuild_delay", with = "millis")]
    pub rebuild_delay: Duration,
}

fn default_status_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_new_round_delay() -> Duration {
    Duration::from_millis(6_000)
}

fn default_rebuild_delay() -> Duration {
    Duration::from_secs(60)
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

impl BasketConfig {
    /// Create a basket configuration with default timings
    ///
    /// # Arguments
    /// * `symbol` - Symbol to trade
    /// * `size_usd` - Base order notional
    /// * `grid_step_percent` - Adverse move before the next entry
    /// * `tp_percent` - Take-profit distance from entry
    /// * `size_factor` - Growth factor applied to the position size
    /// * `max_drawdown_percent` - Tolerated loss in percent of `size_usd`
    pub fn new(
        symbol: impl Into<String>,
        size_usd: f64,
        grid_step_percent: f64,
        tp_percent: f64,
        size_factor: f64,
        max_drawdown_percent: f64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            size_usd,
            grid_step_percent,
            tp_percent,
            size_factor,
            max_drawdown: max_drawdown_percent / 100.0,
            leverage: None,
            debug: false,
            backtest: false,
            status_interval: default_status_interval(),
            new_round_delay: default_new_round_delay(),
            rebuild_delay: default_rebuild_delay(),
        }
    }

    /// Build a basket configuration for `symbol` from shared parameters
    pub fn from_params(symbol: impl Into<String>, params: &BasketParams) -> Self {
        Self::new(
            symbol,
            params.size_usd,
            params.grid_step_percent,
            params.tp_percent,
            params.size_factor,
            params.max_drawdown_percent,
        )
    }

    /// Builder: set leverage applied at init
    pub fn with_leverage(mut self, leverage: u32) -> Self {
        self.leverage = Some(leverage);
        self
    }

    /// Builder: enable diagnostic grid-size tracking
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Builder: mark as running inside a simulation
    pub fn with_backtest(mut self, backtest: bool) -> Self {
        self.backtest = backtest;
        self
    }

    /// Builder: set status snapshot interval
    pub fn with_status_interval(mut self, interval: Duration) -> Self {
        self.status_interval = interval;
        self
    }

    /// Builder: set init delays for the first round and for the grid rebuild
    pub fn with_init_delays(mut self, new_round: Duration, rebuild: Duration) -> Self {
        self.new_round_delay = new_round;
        self.rebuild_delay = rebuild;
        self
    }

    /// Validate the configuration
    ///
    /// A grid step of 100% or more is accepted here; the resulting
    /// non-positive trigger price is rejected when the grid order is built.
    pub fn validate(&self) -> BasketResult<()> {
        if self.symbol.is_empty() {
            return Err(BasketError::InvalidConfig("symbol cannot be empty".into()));
        }

        if self.size_usd <= 0.0 {
            return Err(BasketError::InvalidConfig("size_usd must be positive".into()));
        }

        if self.grid_step_percent <= 0.0 {
            return Err(BasketError::InvalidConfig(
                "grid_step_percent must be positive".into(),
            ));
        }

        if self.tp_percent <= 0.0 {
            return Err(BasketError::InvalidConfig("tp_percent must be positive".into()));
        }

        if self.size_factor < 0.0 {
            return Err(BasketError::InvalidConfig(
                "size_factor cannot be negative".into(),
            ));
        }

        if self.max_drawdown <= 0.0 {
            return Err(BasketError::InvalidConfig(
                "max_drawdown_percent must be positive".into(),
            ));
        }

        if let Some(leverage) = self.leverage {
            if leverage < MIN_LEVERAGE {
                return Err(BasketError::LeverageTooLow {
                    requested: leverage,
                    min: MIN_LEVERAGE,
                });
            }
        }

        if self.status_interval.is_zero() {
            return Err(BasketError::InvalidConfig(
                "status_interval must be non-zero".into(),
            ));
        }

        Ok(())
    }

    /// Maximum tolerated unrealised loss in quote currency
    pub fn max_loss_usd(&self) -> f64 {
        self.size_usd * self.max_drawdown
    }

    /// Load config from JSON file
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> BasketResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        let config = BasketConfig::new("ADA/USDT:USDT", 100.0, 10.0, 1.0, 1.0, 10.0);
        assert!(config.validate().is_ok());

        let config = BasketConfig::new("", 100.0, 10.0, 1.0, 1.0, 10.0);
        assert!(config.validate().is_err());

        let config = BasketConfig::new("ADA/USDT:USDT", 0.0, 10.0, 1.0, 1.0, 10.0);
        assert!(config.validate().is_err());

        let config = BasketConfig::new("ADA/USDT:USDT", 100.0, 0.0, 1.0, 1.0, 10.0);
        assert!(config.validate().is_err());

        let config = BasketConfig::new("ADA/USDT:USDT", 100.0, 10.0, 1.0, -1.0, 10.0);
        assert!(config.validate().is_err());

        // Oversized step is a runtime concern, not a config error
        let config = BasketConfig::new("ADA/USDT:USDT", 100.0, 150.0, 1.0, 1.0, 10.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_low_leverage_rejected() {
        let config = BasketConfig::new("ADA/USDT:USDT", 100.0, 10.0, 1.0, 1.0, 10.0).with_leverage(5);
        assert!(matches!(
            config.validate(),
            Err(BasketError::LeverageTooLow { requested: 5, min: 15 })
        ));
    }

    #[test]
    fn test_drawdown_stored_as_fraction() {
        let config = BasketConfig::new("ADA/USDT:USDT", 100.0, 10.0, 1.0, 1.0, 10.0);
        assert!((config.max_drawdown - 0.10).abs() < 1e-12);
        assert!((config.max_loss_usd() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_from_params_defaults() {
        let config = BasketConfig::from_params("XRP/USDT:USDT", &BasketParams::default());
        assert_eq!(config.size_usd, 10.0);
        assert_eq!(config.grid_step_percent, 10.0);
        assert_eq!(config.tp_percent, 2.0);
        assert_eq!(config.size_factor, 1.0);
        assert!((config.max_drawdown - 4000.0).abs() < 1e-9);
        assert_eq!(config.status_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_json_roundtrip_uses_millis() {
        let config = BasketConfig::new("ADA/USDT:USDT", 100.0, 10.0, 1.0, 1.0, 10.0)
            .with_status_interval(Duration::from_millis(2500));
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["status_interval"], 2500);

        let loaded: BasketConfig = serde_json::from_value(json).unwrap();
        assert_eq!(loaded.status_interval, Duration::from_millis(2500));
    }
}
