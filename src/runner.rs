use std::path::Path;
use std::time::Duration;

use log::{error, info, warn};
use tokio::sync::watch;

use crate::basket::{OrderGateway, TableReport, TaskScheduler};
use crate::bot::{start_server, GridBot, GridBotConfig};
use crate::config::{ConfigError, Settings};
use crate::market::{PaperGateway, RandomWalkFeed};

/// Runner for the grid basket bot on the paper venue
pub struct BotRunner {
    config: Settings,
}

impl BotRunner {
    /// Create a new runner from a configuration file
    pub fn new(config_path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = config_path.as_ref().to_string_lossy();
        let config = Settings::new(&path)?;
        Ok(Self { config })
    }

    pub fn from_settings(config: Settings) -> Self {
        Self { config }
    }

    /// Run until Ctrl-C
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        // 1. Setup Logging
        if std::env::var("RUST_LOG").is_err() {
            std::env::set_var("RUST_LOG", &self.config.log.level);
        }
        env_logger::try_init().ok();

        info!("Starting BotRunner...");

        // 2. Resolve baskets
        let bot_config = GridBotConfig::from_settings(&self.config);
        if bot_config.symbols.is_empty() {
            return Err("No symbols configured: set bot.symbols or bot.coins".into());
        }

        // 3. Paper venue and price feed
        let paper = &self.config.paper;
        let gateway = PaperGateway::new(paper.spread_percent);
        for symbol in &bot_config.symbols {
            let price = self.config.start_price(symbol);
            info!("[{}] Paper market opened at {}", symbol, price);
            gateway.add_symbol(symbol, price).await;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let feed = RandomWalkFeed::new(
            gateway.clone(),
            paper.volatility_percent,
            Duration::from_millis(paper.step_ms),
        );
        let feed_handle = tokio::spawn(feed.run(shutdown_rx.clone()));

        // 4. Shared scheduler and report
        let scheduler = TaskScheduler::new();
        let report = TableReport::new();

        if self.config.server.enabled {
            let report = report.clone();
            let host = self.config.server.host.clone();
            let port = self.config.server.port;
            tokio::spawn(async move {
                if let Err(e) = start_server(report, &host, port).await {
                    error!("Dashboard server stopped: {}", e);
                }
            });
        }

        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Ctrl-C received, shutting down..."),
                Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
            }
            shutdown_tx.send(true).ok();
        });

        // 5. Baskets
        let symbols = bot_config.symbols.clone();
        let bot = GridBot::new(bot_config, gateway.clone(), scheduler.clone(), report);
        let started = bot.run(shutdown_rx).await?;
        info!("{} baskets stopped", started);

        if let Err(e) = scheduler.shutdown() {
            warn!("Scheduler shutdown: {}", e);
        }
        feed_handle.await.ok();

        // 6. Session summary
        for symbol in &symbols {
            let price = gateway.price(symbol).await.unwrap_or_default();
            let contract_size = gateway
                .instrument(symbol)
                .await
                .map(|i| i.contract_size)
                .unwrap_or(1.0);
            if let Some(position) = gateway.paper_position(symbol).await {
                info!(
                    "[{}] Position: {:.4} contracts, Realized PnL: {:.4}, Unrealized PnL: {:.4}",
                    symbol,
                    position.contracts,
                    position.realized_pnl,
                    position.unrealized_pnl(price, contract_size)
                );
            }
        }
        info!("Total fees paid: {:.4}", gateway.total_fees().await);

        Ok(())
    }
}
