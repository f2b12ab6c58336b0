//! GridBot - one basket runner per configured symbol

use std::time::Duration;

use futures_util::future::join_all;
use log::{error, info, warn};
use tokio::sync::watch;

use crate::basket::{
    BasketConfig, BasketError, BasketParams, BasketResult, BasketRunner, OrderFeed, OrderGateway,
    RunnerConfig, Scheduler, StatusReporter,
};
use crate::config::Settings;

/// Quote and settlement suffix appended to coin shorthand
const USDT_PERP_SUFFIX: &str = "/USDT:USDT";

/// Merge explicit symbols with coin shorthand ("ADA" -> "ADA/USDT:USDT"),
/// keeping the first occurrence of each symbol
pub fn resolve_symbols(symbols: &[String], coins: &str) -> Vec<String> {
    let from_coins = coins
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|c| format!("{}{}", c.to_uppercase(), USDT_PERP_SUFFIX));

    let mut resolved: Vec<String> = Vec::new();
    for symbol in symbols.iter().map(|s| s.trim().to_string()).chain(from_coins) {
        if symbol.is_empty() {
            continue;
        }
        if resolved.contains(&symbol) {
            warn!("Duplicate symbol {} skipped", symbol);
            continue;
        }
        resolved.push(symbol);
    }
    resolved
}

/// Bot-level configuration shared by all baskets
#[derive(Debug, Clone)]
pub struct GridBotConfig {
    pub symbols: Vec<String>,
    pub params: BasketParams,
    pub leverage: Option<u32>,
    pub debug: bool,
    pub backtest: bool,
    pub runner: RunnerConfig,
    /// Pause between starting two baskets
    pub create_delay: Duration,
}

impl GridBotConfig {
    pub fn new(symbols: Vec<String>, params: BasketParams) -> Self {
        Self {
            symbols,
            params,
            leverage: None,
            debug: false,
            backtest: false,
            runner: RunnerConfig::default(),
            create_delay: Duration::from_secs(1),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let bot = &settings.bot;
        Self {
            symbols: resolve_symbols(&bot.symbols, &bot.coins),
            params: settings.basket.clone(),
            leverage: bot.leverage,
            debug: bot.debug,
            backtest: bot.backtest,
            runner: RunnerConfig {
                tick_interval: Duration::from_millis(bot.tick_interval_ms),
            },
            create_delay: Duration::from_millis(bot.create_delay_ms),
        }
    }

    /// Immutable basket configuration for one symbol
    pub fn basket_config(&self, symbol: &str) -> BasketConfig {
        let config = BasketConfig::from_params(symbol, &self.params)
            .with_debug(self.debug)
            .with_backtest(self.backtest);
        match self.leverage {
            Some(leverage) => config.with_leverage(leverage),
            None => config,
        }
    }
}

/// Runs one [`BasketRunner`] per symbol on shared gateway, scheduler and
/// reporter handles
pub struct GridBot<G, S, R> {
    config: GridBotConfig,
    gateway: G,
    scheduler: S,
    reporter: R,
}

impl<G, S, R> GridBot<G, S, R>
where
    G: OrderGateway + OrderFeed + Clone + 'static,
    S: Scheduler + Clone + 'static,
    R: StatusReporter + Clone + 'static,
{
    pub fn new(config: GridBotConfig, gateway: G, scheduler: S, reporter: R) -> Self {
        Self {
            config,
            gateway,
            scheduler,
            reporter,
        }
    }

    pub fn config(&self) -> &GridBotConfig {
        &self.config
    }

    /// Start every basket and wait until all runners have exited
    ///
    /// # Returns
    /// Number of baskets started
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> BasketResult<usize> {
        if self.config.symbols.is_empty() {
            return Err(BasketError::InvalidConfig("no symbols configured".into()));
        }
        info!(
            "Starting grid bot for {} symbols: {}",
            self.config.symbols.len(),
            self.config.symbols.join(", ")
        );

        let mut handles = Vec::with_capacity(self.config.symbols.len());
        let mut waiter = shutdown.clone();
        for (i, symbol) in self.config.symbols.iter().enumerate() {
            if i > 0 && !self.config.create_delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(self.config.create_delay) => {}
                    _ = waiter.changed() => {
                        warn!("Shutdown requested while starting baskets");
                        break;
                    }
                }
            }

            let runner = BasketRunner::new(
                self.config.basket_config(symbol),
                self.gateway.clone(),
                self.scheduler.clone(),
                self.reporter.clone(),
                self.config.runner.clone(),
                shutdown.clone(),
            )
            .await;

            match runner {
                Ok(mut runner) => {
                    let symbol = symbol.clone();
                    handles.push(tokio::spawn(async move {
                        let result = runner.run().await;
                        (symbol, result)
                    }));
                }
                Err(e) => error!("[{}] Failed to create basket: {}", symbol, e),
            }
        }

        let started = handles.len();
        for joined in join_all(handles).await {
            match joined {
                Ok((symbol, Ok(()))) => info!("[{}] Basket runner finished", symbol),
                Ok((symbol, Err(e))) => error!("[{}] Basket runner failed: {}", symbol, e),
                Err(e) => error!("Basket task panicked: {}", e),
            }
        }
        Ok(started)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basket::gateway::mock::{GatewayCall, MockGateway};
    use crate::basket::reporter::mock::RecordingReporter;
    use crate::basket::TaskScheduler;

    #[test]
    fn test_resolve_symbols() {
        let symbols = vec!["BTC/USDT:USDT".to_string(), "ADA/USDT:USDT".to_string()];
        let resolved = resolve_symbols(&symbols, "ada, xrp,,BTC ");
        assert_eq!(
            resolved,
            vec![
                "BTC/USDT:USDT".to_string(),
                "ADA/USDT:USDT".to_string(),
                "XRP/USDT:USDT".to_string(),
            ]
        );
        assert!(resolve_symbols(&[], "").is_empty());
    }

    #[test]
    fn test_basket_config_from_bot_config() {
        let mut config = GridBotConfig::new(vec!["ADA/USDT:USDT".into()], BasketParams::default());
        config.leverage = Some(30);
        config.debug = true;

        let basket = config.basket_config("ADA/USDT:USDT");
        assert_eq!(basket.symbol, "ADA/USDT:USDT");
        assert_eq!(basket.leverage, Some(30));
        assert!(basket.debug);
        assert!(!basket.backtest);
        assert_eq!(basket.size_usd, 10.0);
    }

    #[tokio::test]
    async fn test_empty_symbols_rejected() {
        let (_tx, rx) = watch::channel(false);
        let bot = GridBot::new(
            GridBotConfig::new(Vec::new(), BasketParams::default()),
            MockGateway::new(1.0),
            TaskScheduler::new(),
            RecordingReporter::new(),
        );
        assert!(matches!(bot.run(rx).await, Err(BasketError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_runs_one_basket_per_symbol() {
        let gateway = MockGateway::new(1.0);
        let scheduler = TaskScheduler::new();
        let mut config = GridBotConfig::new(
            resolve_symbols(&[], "ADA,XRP,ADA"),
            BasketParams::default(),
        );
        config.create_delay = Duration::from_millis(5);
        config.backtest = true;

        let bot = GridBot::new(config, gateway.clone(), scheduler.clone(), RecordingReporter::new());
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(bot.run(rx));

        for _ in 0..200 {
            let inits = gateway.calls().await.iter().filter(|c| **c == GatewayCall::Init).count();
            if inits == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        tx.send(true).unwrap();

        let started = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(started, 2);
        scheduler.shutdown().unwrap();
    }
}
