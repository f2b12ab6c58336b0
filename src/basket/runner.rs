//! Basket runner - main execution loop
//!
//! One runner owns one basket. Scheduler commands, order notifications and the
//! periodic tick are handled one at a time, so the basket itself needs no
//! locking.

use std::time::Duration;

use log::{debug, error, info};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::basket::GridBasket;
use super::config::BasketConfig;
use super::errors::BasketResult;
use super::gateway::{OrderFeed, OrderGateway};
use super::reporter::StatusReporter;
use super::scheduler::{BasketCommand, Scheduler};
use super::types::Order;

/// Basket runner configuration
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Period of the exit check
    pub tick_interval: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(60),
        }
    }
}

/// Event loop driving a single [`GridBasket`]
pub struct BasketRunner<G, S, R> {
    basket: GridBasket<G, S, R>,
    commands: UnboundedReceiver<BasketCommand>,
    orders: UnboundedReceiver<Order>,
    runner_config: RunnerConfig,
    shutdown: watch::Receiver<bool>,
}

impl<G, S, R> BasketRunner<G, S, R>
where
    G: OrderGateway + OrderFeed + 'static,
    S: Scheduler + 'static,
    R: StatusReporter + 'static,
{
    /// Validate the config, register the basket with the scheduler and
    /// subscribe to its order updates
    pub async fn new(
        config: BasketConfig,
        gateway: G,
        scheduler: S,
        reporter: R,
        runner_config: RunnerConfig,
        shutdown: watch::Receiver<bool>,
    ) -> BasketResult<Self> {
        config.validate()?;

        let (tx, commands) = unbounded_channel();
        scheduler.register_handler(&config.symbol, tx)?;
        let orders = gateway.subscribe(&config.symbol).await?;

        Ok(Self {
            basket: GridBasket::new(config, gateway, scheduler, reporter),
            commands,
            orders,
            runner_config,
            shutdown,
        })
    }

    pub fn basket(&self) -> &GridBasket<G, S, R> {
        &self.basket
    }

    /// Initialise the basket and process events until shutdown
    pub async fn run(&mut self) -> BasketResult<()> {
        let symbol = self.basket.symbol().to_string();
        info!("[{}] Starting basket runner", symbol);
        self.basket.init().await?;

        let period = self.runner_config.tick_interval;
        let mut tick_timer = interval_at(Instant::now() + period, period);
        tick_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                Some(command) = self.commands.recv() => {
                    debug!("[{}] Command {:?}", symbol, command);
                    if let Err(e) = self.basket.handle_command(command).await {
                        error!("[{}] Error handling {:?}: {}", symbol, command, e);
                    }
                }
                Some(order) = self.orders.recv() => {
                    if let Err(e) = self.basket.on_order_change(&order).await {
                        error!("[{}] Error handling order {}: {}", symbol, order.id, e);
                    }
                }
                _ = tick_timer.tick() => {
                    if let Err(e) = self.basket.on_tick().await {
                        error!("[{}] Tick failed: {}", symbol, e);
                    }
                }
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        info!("[{}] Shutting down basket runner (round #{})", symbol, self.basket.basket_id());
                        break;
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basket::gateway::mock::{GatewayCall, MockGateway};
    use crate::basket::reporter::mock::RecordingReporter;
    use crate::basket::reporter::BASKETS_INFO_TABLE;
    use crate::basket::scheduler::TaskScheduler;
    use crate::basket::types::Position;

    const SYMBOL: &str = "BTC/USDT:USDT";

    fn fast_config() -> BasketConfig {
        BasketConfig::new(SYMBOL, 100.0, 10.0, 1.0, 1.0, 10.0)
            .with_init_delays(Duration::from_millis(10), Duration::from_secs(3600))
            .with_status_interval(Duration::from_millis(20))
    }

    async fn wait_for_call(gateway: &MockGateway, count: usize, pred: fn(&GatewayCall) -> bool) {
        for _ in 0..400 {
            if gateway.calls().await.iter().filter(|c| pred(c)).count() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("gateway never saw {} matching calls", count);
    }

    fn is_limit(call: &GatewayCall) -> bool {
        matches!(call, GatewayCall::BuyLimit { .. })
    }

    fn is_sell(call: &GatewayCall) -> bool {
        matches!(call, GatewayCall::SellMarket { .. })
    }

    #[tokio::test]
    async fn test_runner_opens_round_and_pyramids_on_fill() {
        let gateway = MockGateway::new(100.0);
        let scheduler = TaskScheduler::new();
        let reporter = RecordingReporter::new();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut runner = BasketRunner::new(
            fast_config(),
            gateway.clone(),
            scheduler.clone(),
            reporter.clone(),
            RunnerConfig::default(),
            shutdown_rx,
        )
        .await
        .unwrap();
        let handle = tokio::spawn(async move { runner.run().await });

        wait_for_call(&gateway, 1, is_limit).await;
        let id = gateway.open_orders.lock().await[0].id.clone();
        gateway.fill_order(&id).await.unwrap();
        wait_for_call(&gateway, 2, is_limit).await;

        let limits: Vec<GatewayCall> = gateway.calls().await.into_iter().filter(is_limit).collect();
        assert_eq!(limits[1], GatewayCall::BuyLimit { amount: 2.0, price: 90.0 });

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap().unwrap();
        scheduler.shutdown().unwrap();

        assert!(!reporter.calls_for(BASKETS_INFO_TABLE).await.is_empty());
    }

    #[tokio::test]
    async fn test_tick_closes_round_at_take_profit() {
        let gateway = MockGateway::new(102.0);
        gateway.set_position(Position::new(1.0, 100.0)).await;
        let scheduler = TaskScheduler::new();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut runner = BasketRunner::new(
            fast_config().with_backtest(true),
            gateway.clone(),
            scheduler.clone(),
            RecordingReporter::new(),
            RunnerConfig {
                tick_interval: Duration::from_millis(10),
            },
            shutdown_rx,
        )
        .await
        .unwrap();
        let handle = tokio::spawn(async move { runner.run().await });

        wait_for_call(&gateway, 1, is_sell).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap().unwrap();
        scheduler.shutdown().unwrap();

        assert!(gateway
            .calls()
            .await
            .contains(&GatewayCall::SellMarket { amount: 1.0 }));
    }

    #[tokio::test]
    async fn test_shutdown_stops_idle_runner() {
        let gateway = MockGateway::new(100.0);
        let scheduler = TaskScheduler::new();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let config = fast_config()
            .with_backtest(true)
            .with_init_delays(Duration::from_secs(3600), Duration::from_secs(3600));
        let mut runner = BasketRunner::new(
            config,
            gateway.clone(),
            scheduler.clone(),
            RecordingReporter::new(),
            RunnerConfig::default(),
            shutdown_rx,
        )
        .await
        .unwrap();
        let handle = tokio::spawn(async move { runner.run().await });

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        scheduler.shutdown().unwrap();
        assert!(gateway.order_calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let (_tx, rx) = watch::channel(false);
        let config = BasketConfig::new(SYMBOL, 0.0, 10.0, 1.0, 1.0, 10.0);
        let result = BasketRunner::new(
            config,
            MockGateway::new(100.0),
            TaskScheduler::new(),
            RecordingReporter::new(),
            RunnerConfig::default(),
            rx,
        )
        .await;
        assert!(result.is_err());
    }
}
