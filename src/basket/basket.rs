//! Grid basket - one symbol's round lifecycle
//!
//! A round starts with a market buy sized from `size_usd` and one resting
//! limit buy `grid_step_percent` below the price. Every time that limit fills
//! the next one is placed lower, sized from the grown position. The round
//! closes when the bid clears the entry by `tp_percent`, and a new one starts
//! right away. An unrealised loss beyond `size_usd * max_drawdown` stops the
//! basket for good.

use std::time::Duration;

use log::{debug, error, info, warn};
use serde::Serialize;
use serde_json::Value;

use crate::helpers::{format_percent, percent_difference, round_to};

use super::config::{BasketConfig, GRID_SIZE_ALERT_USD, MIN_LEVERAGE};
use super::errors::{BasketError, BasketResult};
use super::gateway::OrderGateway;
use super::reporter::{StatusReporter, BASKETS_INFO_TABLE, GRID_SIZE_INFO_TABLE, GRID_STEP_INFO_TABLE};
use super::scheduler::{BasketCommand, Scheduler, TaskTime, TimeTask};
use super::snapshot::{BasketInfo, BasketInfoPatch, HealthStatus};
use super::state::BasketState;
use super::strategy;
use super::types::{BasketPhase, MarketSnapshot, Order, Position, PositionSide};

/// Delay before the first status snapshot task fires
const STATUS_FIRST_DELAY: Duration = Duration::from_secs(1);

/// Grid basket for one symbol
///
/// Owns its gateway, scheduler and reporter handles. All methods take
/// `&mut self`; the basket is driven by a single [`BasketRunner`] task.
///
/// [`BasketRunner`]: super::runner::BasketRunner
pub struct GridBasket<G, S, R> {
    config: BasketConfig,
    gateway: G,
    scheduler: S,
    reporter: R,
    state: BasketState,
}

impl<G, S, R> GridBasket<G, S, R>
where
    G: OrderGateway,
    S: Scheduler,
    R: StatusReporter,
{
    pub fn new(config: BasketConfig, gateway: G, scheduler: S, reporter: R) -> Self {
        let state = BasketState::new(&config.symbol);
        Self {
            config,
            gateway,
            scheduler,
            reporter,
            state,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.config.symbol
    }

    pub fn config(&self) -> &BasketConfig {
        &self.config
    }

    pub fn state(&self) -> &BasketState {
        &self.state
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn basket_id(&self) -> u64 {
        self.state.basket_id
    }

    pub fn is_stopped(&self) -> bool {
        self.state.is_stopped
    }

    pub fn info(&self) -> &BasketInfo {
        &self.state.info
    }

    // ========================================================================
    // Initialization
    // ========================================================================

    /// Prepare the basket and arm its first tasks
    ///
    /// Lower-layer and leverage failures do not abort init; they are kept in
    /// `init_errors` and every later snapshot reports a degraded status.
    pub async fn init(&mut self) -> BasketResult<()> {
        let symbol = self.config.symbol.clone();

        if let Err(e) = self.gateway.init(&symbol).await {
            error!("[{}] Gateway init failed: {}", symbol, e);
            self.state.init_errors.push(e.to_string());
        }

        if let Some(leverage) = self.config.leverage {
            if let Err(e) = self.set_leverage(leverage).await {
                error!("[{}] Failed to apply leverage {}: {}", symbol, leverage, e);
                self.state.init_errors.push(e.to_string());
            }
        }

        info!(
            "[{}] Grid basket: size={} USD, step={}%, tp={}%, size_factor={}, max_loss={} USD",
            symbol,
            self.config.size_usd,
            self.config.grid_step_percent,
            self.config.tp_percent,
            self.config.size_factor,
            self.config.max_loss_usd()
        );

        match self.read_orders_and_position().await {
            Ok((orders, position)) => {
                if position.is_flat() {
                    self.scheduler.add_task(
                        TimeTask::once(
                            "newRound",
                            symbol.as_str(),
                            TaskTime::After(self.config.new_round_delay),
                            BasketCommand::NewRound,
                        )
                        .with_comment(symbol.as_str()),
                    )?;
                    self.state.phase = BasketPhase::Flat;
                } else {
                    info!(
                        "[{}] Resuming with {} contracts @ {:?}, {} open orders",
                        symbol,
                        position.contracts,
                        position.entry_price,
                        orders.len()
                    );
                    if orders.is_empty() {
                        self.scheduler.add_task(TimeTask::once(
                            format!("createLimitByStepInit{}", symbol),
                            symbol.as_str(),
                            TaskTime::After(self.config.rebuild_delay),
                            BasketCommand::CreateLimitByStep,
                        ))?;
                    }
                    self.state.phase = BasketPhase::RoundOpen;
                }
                self.state.buy_position = position;
            }
            Err(e) => {
                error!("[{}] Failed to read orders and position: {}", symbol, e);
                self.state.init_errors.push(e.to_string());
            }
        }

        if !self.config.backtest {
            self.scheduler.add_task(
                TimeTask::once(
                    "basketInfo",
                    symbol.as_str(),
                    TaskTime::After(STATUS_FIRST_DELAY),
                    BasketCommand::BasketInfo,
                )
                .every(self.config.status_interval),
            )?;
            self.basket_info(None).await;
        }

        Ok(())
    }

    async fn read_orders_and_position(&self) -> BasketResult<(Vec<Order>, Position)> {
        let orders = self.gateway.open_orders(&self.config.symbol).await?;
        let position = self
            .gateway
            .position(&self.config.symbol, PositionSide::Long, false)
            .await?;
        Ok((orders, position))
    }

    /// Run a command delivered by the scheduler
    pub async fn handle_command(&mut self, command: BasketCommand) -> BasketResult<()> {
        match command {
            BasketCommand::NewRound => self.new_round().await,
            BasketCommand::CreateLimitByStep => self.create_limit_by_step().await.map(|_| ()),
            BasketCommand::BasketInfo => {
                self.basket_info(None).await;
                Ok(())
            }
        }
    }

    // ========================================================================
    // Round lifecycle
    // ========================================================================

    /// Open a new round: market entry plus the first grid order
    pub async fn new_round(&mut self) -> BasketResult<()> {
        if self.state.is_stopped {
            debug!("[{}] Stopped, not starting a new round", self.config.symbol);
            return Ok(());
        }

        let basket_id = self.state.begin_round();
        let symbol = self.config.symbol.clone();
        let amount = self.gateway.usd_to_contracts(&symbol, self.config.size_usd).await?;

        info!("[{}] Round #{}: market buy {:.6} contracts", symbol, basket_id, amount);
        let order = self.gateway.buy_market(&symbol, amount).await?;
        debug!("[{}] Entry order {} filled at {}", symbol, order.id, order.price);

        self.create_limit_by_step().await?;
        Ok(())
    }

    /// Place the next grid limit buy one step below the current price
    ///
    /// Returns `None` without touching the venue when the basket is stopped or
    /// when the computed price or amount is not positive.
    pub async fn create_limit_by_step(&mut self) -> BasketResult<Option<Order>> {
        if self.state.is_stopped {
            return Ok(None);
        }

        let symbol = self.config.symbol.clone();
        let market = self.gateway.market(&symbol).await?;
        let trigger = strategy::pyramid_trigger_price(market.price, self.config.grid_step_percent);
        if trigger <= 0.0 {
            error!(
                "[{}] Grid order price {} is not positive (price={}, step={}%)",
                symbol, trigger, market.price, self.config.grid_step_percent
            );
            return Ok(None);
        }
        self.state.info.next_order_price = trigger;

        let position = self.gateway.position(&symbol, PositionSide::Long, true).await?;
        let base = self.gateway.usd_to_contracts(&symbol, self.config.size_usd).await?;
        let amount = strategy::next_entry_amount(position.contracts, self.config.size_factor, base);
        self.state.buy_position = position;

        if amount.is_nan() || amount <= 0.0 {
            error!(
                "[{}] Grid order amount {} is not positive: position={:?}, size_factor={}, base={}, market={:?}",
                symbol, amount, self.state.buy_position, self.config.size_factor, base, market
            );
            return Ok(None);
        }

        let order = self.gateway.buy_limit(&symbol, amount, trigger).await?;
        info!(
            "[{}] Grid order {}: buy {:.6} @ {} (prev {})",
            symbol, order.id, amount, trigger, self.state.prev_order_price
        );
        self.state.prev_order_price = trigger;
        self.state.last_grid_order = Some(order.id.clone());
        Ok(Some(order))
    }

    /// Stop on drawdown, otherwise close the round once take-profit is reached
    pub async fn check_round_to_close(&mut self) -> BasketResult<()> {
        if self.state.is_stopped {
            return Ok(());
        }

        let symbol = self.config.symbol.clone();
        let market = self.gateway.market(&symbol).await?;
        let instrument = self.gateway.instrument(&symbol).await?;
        let position = self.state.buy_position.clone();

        let profit = strategy::long_profit(&position, market.close, instrument.contract_size);
        if strategy::drawdown_breached(self.config.size_usd, self.config.max_drawdown, profit) {
            warn!(
                "[{}] Drawdown limit hit: profit={:.4} USD, limit={:.4} USD, position={:?}",
                symbol,
                profit,
                self.config.max_loss_usd(),
                position
            );
            return self.stop_basket().await;
        }

        if let Err(e) = self.try_take_profit(&position, &market).await {
            error!(
                "[{}] Take-profit check failed: {} (position={:?}, market={:?})",
                symbol, e, position, market
            );
        }
        Ok(())
    }

    async fn try_take_profit(&mut self, position: &Position, market: &MarketSnapshot) -> BasketResult<()> {
        let Some(entry) = position.entry_price else {
            return Ok(());
        };
        if position.is_flat() {
            return Ok(());
        }

        if strategy::take_profit_reached(entry, market.bid, self.config.tp_percent) {
            info!(
                "[{}] Take profit: entry={} bid={} ({:.3}%)",
                self.config.symbol,
                entry,
                market.bid,
                percent_difference(entry, market.bid)
            );
            self.close_round().await?;
        }
        Ok(())
    }

    /// Exit the position, cancel resting orders and start over
    pub async fn close_round(&mut self) -> BasketResult<()> {
        if self.state.is_stopped {
            return Ok(());
        }
        self.state.phase = BasketPhase::Closing;

        let symbol = self.config.symbol.clone();
        let position = self.gateway.position(&symbol, PositionSide::Long, true).await?;
        if position.contracts > 0.0 {
            self.gateway.sell_market(&symbol, position.contracts).await?;
        }
        let cancelled = self.gateway.cancel_all_orders(&symbol).await?;
        info!(
            "[{}] Round #{} closed: sold {} contracts, cancelled {} orders, {} grid fills",
            symbol, self.state.basket_id, position.contracts, cancelled, self.state.round_fills
        );
        self.state.buy_position = Position::flat();

        let result = self.new_round().await;
        self.publish_grid_log().await;
        result
    }

    /// Disable the basket and liquidate. Irreversible.
    ///
    /// The position is sold even when cancelling resting orders fails; the
    /// first error is returned.
    pub async fn stop_basket(&mut self) -> BasketResult<()> {
        self.state.stop();
        warn!("[{}] Basket stopped", self.config.symbol);

        let symbol = self.config.symbol.clone();
        let cancelled = self.gateway.cancel_all_orders(&symbol).await;
        if let Err(e) = &cancelled {
            error!("[{}] Failed to cancel orders on stop: {}", symbol, e);
        }

        let liquidated = self.liquidate().await;
        if let Err(e) = &liquidated {
            error!(
                "[{}] Failed to liquidate on stop: {} (position={:?})",
                symbol, e, self.state.buy_position
            );
        }

        cancelled.and(liquidated)
    }

    async fn liquidate(&mut self) -> BasketResult<()> {
        let symbol = self.config.symbol.clone();
        let position = self.gateway.position(&symbol, PositionSide::Long, true).await?;
        if position.contracts > 0.0 {
            self.gateway.sell_market(&symbol, position.contracts).await?;
        }
        self.state.buy_position = Position::flat();
        Ok(())
    }

    /// Apply leverage, clamped to the instrument maximum
    ///
    /// # Returns
    /// The leverage actually applied
    pub async fn set_leverage(&self, requested: u32) -> BasketResult<u32> {
        if requested < MIN_LEVERAGE {
            return Err(BasketError::LeverageTooLow {
                requested,
                min: MIN_LEVERAGE,
            });
        }

        let instrument = self.gateway.instrument(&self.config.symbol).await?;
        let leverage = if requested > instrument.max_leverage {
            warn!(
                "[{}] Leverage {} is too high, max is {}",
                self.config.symbol, requested, instrument.max_leverage
            );
            instrument.max_leverage
        } else {
            requested
        };

        self.gateway.set_leverage(&self.config.symbol, leverage).await?;
        info!("[{}] Leverage set to {}", self.config.symbol, leverage);
        Ok(leverage)
    }

    // ========================================================================
    // Event handlers
    // ========================================================================

    /// React to an order notification from the feed
    pub async fn on_order_change(&mut self, order: &Order) -> BasketResult<()> {
        if self.state.is_stopped || !order.is_filled_grid_entry() {
            return Ok(());
        }

        info!(
            "[{}] Grid order {} filled: {} @ {}",
            self.config.symbol, order.id, order.amount, order.price
        );
        let is_current = self
            .state
            .last_grid_order
            .as_deref()
            .map_or(true, |id| id == order.id);
        if is_current {
            self.state.round_fills += 1;
            self.state.phase = BasketPhase::Pyramiding;
        } else {
            warn!(
                "[{}] Filled grid order {} is not the last one placed ({:?}), round #{} fills unchanged",
                self.config.symbol, order.id, self.state.last_grid_order, self.state.basket_id
            );
        }
        self.create_limit_by_step().await?;

        if self.config.debug {
            self.record_grid_fill(order).await?;
        }
        Ok(())
    }

    async fn record_grid_fill(&mut self, order: &Order) -> BasketResult<()> {
        let symbol = self.config.symbol.clone();
        let amount = self
            .gateway
            .position(&symbol, PositionSide::Long, false)
            .await?
            .contracts;
        let size_usd = self.gateway.contracts_to_usd(&symbol, amount).await?;
        let price = self.gateway.market(&symbol).await?.price;

        self.state
            .grid_log
            .record(&order.id, price, size_usd, amount, self.state.basket_id);
        Ok(())
    }

    /// Periodic tick: refresh the cached position and evaluate exits
    pub async fn on_tick(&mut self) -> BasketResult<()> {
        if self.state.is_stopped {
            return Ok(());
        }
        self.state.buy_position = self
            .gateway
            .position(&self.config.symbol, PositionSide::Long, false)
            .await?;
        self.check_round_to_close().await
    }

    // ========================================================================
    // Reporting
    // ========================================================================

    /// Recompute the status snapshot and publish it
    ///
    /// Always publishes exactly one row, also when the refresh fails; the
    /// failure then shows up in `status` and `errors`.
    pub async fn basket_info(&mut self, patch: Option<BasketInfoPatch>) -> BasketInfo {
        if let Some(patch) = patch {
            self.state.info.apply(patch);
        }
        self.state.info.symbol = self.config.symbol.clone();

        let mut errors = self.state.init_errors.clone();
        if let Err(e) = self.refresh_info().await {
            error!(
                "[{}] Basket info failed: {} (info={:?})",
                self.config.symbol, e, self.state.info
            );
            errors.push(e.to_string());
        }
        self.state.info.status = if errors.is_empty() {
            HealthStatus::Ok
        } else {
            HealthStatus::Error
        };
        self.state.info.errors = errors;

        match serde_json::to_value(&self.state.info) {
            Ok(row) => {
                self.reporter
                    .table_update(BASKETS_INFO_TABLE, vec![row], "symbol")
                    .await
            }
            Err(e) => error!("[{}] Failed to serialize basket info: {}", self.config.symbol, e),
        }

        self.state.info.clone()
    }

    async fn refresh_info(&mut self) -> BasketResult<()> {
        let symbol = self.config.symbol.clone();
        let position = self.gateway.position(&symbol, PositionSide::Long, false).await?;
        let market = self.gateway.market(&symbol).await?;

        if position.is_flat() {
            self.state.info.clear_position();
            self.state.info.price = market.price;
            return Ok(());
        }

        if self.state.info.next_order_price == 0.0 {
            let orders = self.gateway.open_orders(&symbol).await?;
            if let Some(first) = orders.first() {
                self.state.info.next_order_price = first.price;
            }
        }
        if !self.state.info.next_order_price.is_finite() {
            self.state.info.next_order_price = 0.0;
        }

        let entry = position
            .entry_price
            .ok_or_else(|| BasketError::MissingEntryPrice(symbol.clone()))?;
        let size_usd = self.gateway.contracts_to_usd(&symbol, position.contracts).await?;

        let info = &mut self.state.info;
        info.to_profit = format_percent(strategy::distance_to_profit(
            market.price,
            entry,
            self.config.tp_percent,
        ));
        info.to_re_balance = format_percent(percent_difference(market.price, info.next_order_price));
        info.pos_size_usd = round_to(size_usd, 2);
        info.drawdown = round_to(percent_difference(entry, market.close), 2);
        info.entry_price = entry;
        info.price = market.price;
        Ok(())
    }

    /// Publish the round's fill log in diagnostic mode, then reset it
    async fn publish_grid_log(&mut self) {
        if self.config.debug {
            let rows = to_rows(self.state.grid_log.records());
            self.reporter.table_update(GRID_SIZE_INFO_TABLE, rows, "_id").await;

            let peak = self.state.grid_log.peak_usd();
            if peak > GRID_SIZE_ALERT_USD {
                warn!(
                    "[{}] Round peaked at {:.2} USD, publishing grid step report",
                    self.config.symbol, peak
                );
                let rows = to_rows(&self.state.grid_log.step_report());
                self.reporter.table_update(GRID_STEP_INFO_TABLE, rows, "_id").await;
            }
        }
        self.state.grid_log.clear();
    }
}

fn to_rows<T: Serialize>(items: &[T]) -> Vec<Value> {
    items
        .iter()
        .filter_map(|item| match serde_json::to_value(item) {
            Ok(row) => Some(row),
            Err(e) => {
                error!("Failed to serialize report row: {}", e);
                None
            }
        })
        .collect()
}
