//! Order and position gateway abstraction - enables mocking for tests

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedReceiver;

use super::errors::BasketResult;
use super::types::{InstrumentInfo, MarketSnapshot, Order, Position, PositionSide};

/// Exchange operations consumed by a basket
///
/// Implementations own connectivity, retries and timeouts. A single gateway
/// may serve several symbols; every call names the symbol it acts on.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Lower-layer initialisation for a symbol (markets, balances, caches)
    async fn init(&self, symbol: &str) -> BasketResult<()>;

    /// Market buy for `amount` contracts
    async fn buy_market(&self, symbol: &str, amount: f64) -> BasketResult<Order>;

    /// Resting limit buy for `amount` contracts at `price`
    async fn buy_limit(&self, symbol: &str, amount: f64, price: f64) -> BasketResult<Order>;

    /// Reduce-only market sell for `amount` contracts
    async fn sell_market(&self, symbol: &str, amount: f64) -> BasketResult<Order>;

    /// Cancel every resting order of the symbol, returning how many were cancelled
    async fn cancel_all_orders(&self, symbol: &str) -> BasketResult<u32>;

    /// Resting orders of the symbol in placement order
    async fn open_orders(&self, symbol: &str) -> BasketResult<Vec<Order>>;

    /// Position on one side. `force_refresh` bypasses any cached copy.
    async fn position(&self, symbol: &str, side: PositionSide, force_refresh: bool) -> BasketResult<Position>;

    /// Current price, bid, ask and close
    async fn market(&self, symbol: &str) -> BasketResult<MarketSnapshot>;

    /// Contract size, leverage and fee metadata
    async fn instrument(&self, symbol: &str) -> BasketResult<InstrumentInfo>;

    /// Apply leverage on the venue
    async fn set_leverage(&self, symbol: &str, leverage: u32) -> BasketResult<()>;

    /// Convert a quote-currency notional to contracts at the current price
    async fn usd_to_contracts(&self, symbol: &str, usd: f64) -> BasketResult<f64> {
        let market = self.market(symbol).await?;
        let instrument = self.instrument(symbol).await?;
        let unit_value = market.price * instrument.contract_size;
        if unit_value <= 0.0 {
            return Ok(0.0);
        }
        Ok(usd / unit_value)
    }

    /// Convert contracts to quote-currency notional at the current price
    async fn contracts_to_usd(&self, symbol: &str, contracts: f64) -> BasketResult<f64> {
        let market = self.market(symbol).await?;
        let instrument = self.instrument(symbol).await?;
        Ok(contracts * instrument.contract_size * market.price)
    }
}

/// Stream of order-state notifications for one symbol
#[async_trait]
pub trait OrderFeed: Send + Sync {
    /// Subscribe to order updates of a symbol
    async fn subscribe(&self, symbol: &str) -> BasketResult<UnboundedReceiver<Order>>;
}

// ============================================================================
// Mock Implementation for Testing
// ============================================================================

/// Mock gateway for testing baskets without a venue.
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
    use tokio::sync::Mutex;

    use crate::basket::errors::BasketError;
    use crate::basket::types::{OrderKind, OrderSide, OrderStatus};

    /// Gateway call log entry
    #[derive(Debug, Clone, PartialEq)]
    pub enum GatewayCall {
        Init,
        BuyMarket { amount: f64 },
        BuyLimit { amount: f64, price: f64 },
        SellMarket { amount: f64 },
        CancelAll,
        OpenOrders,
        Position { force_refresh: bool },
        Market,
        Instrument,
        SetLeverage(u32),
    }

    impl GatewayCall {
        /// True for calls that change venue state
        pub fn is_order_side_effect(&self) -> bool {
            matches!(
                self,
                GatewayCall::BuyMarket { .. }
                    | GatewayCall::BuyLimit { .. }
                    | GatewayCall::SellMarket { .. }
                    | GatewayCall::CancelAll
                    | GatewayCall::SetLeverage(_)
            )
        }
    }

    /// Mock gateway: market orders fill immediately, limit orders rest until
    /// [`MockGateway::fill_order`] is called.
    #[derive(Clone)]
    pub struct MockGateway {
        pub calls: Arc<Mutex<Vec<GatewayCall>>>,
        pub market: Arc<Mutex<MarketSnapshot>>,
        pub instrument: Arc<Mutex<InstrumentInfo>>,
        pub position: Arc<Mutex<Position>>,
        pub open_orders: Arc<Mutex<Vec<Order>>>,
        pub fail_init: Arc<Mutex<bool>>,
        pub fail_market: Arc<Mutex<bool>>,
        /// Number of upcoming `cancel_all_orders` calls that fail
        pub fail_cancel: Arc<Mutex<u32>>,
        next_id: Arc<AtomicU64>,
        subscribers: Arc<Mutex<HashMap<String, UnboundedSender<Order>>>>,
    }

    impl MockGateway {
        pub fn new(price: f64) -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
                market: Arc::new(Mutex::new(MarketSnapshot::at(price))),
                instrument: Arc::new(Mutex::new(InstrumentInfo::default())),
                position: Arc::new(Mutex::new(Position::flat())),
                open_orders: Arc::new(Mutex::new(Vec::new())),
                fail_init: Arc::new(Mutex::new(false)),
                fail_market: Arc::new(Mutex::new(false)),
                fail_cancel: Arc::new(Mutex::new(0)),
                next_id: Arc::new(AtomicU64::new(1)),
                subscribers: Arc::new(Mutex::new(HashMap::new())),
            }
        }

        pub async fn set_price(&self, price: f64) {
            *self.market.lock().await = MarketSnapshot::at(price);
        }

        pub async fn set_market(&self, market: MarketSnapshot) {
            *self.market.lock().await = market;
        }

        pub async fn set_position(&self, position: Position) {
            *self.position.lock().await = position;
        }

        pub async fn set_max_leverage(&self, max_leverage: u32) {
            self.instrument.lock().await.max_leverage = max_leverage;
        }

        pub async fn set_fail_init(&self, fail: bool) {
            *self.fail_init.lock().await = fail;
        }

        pub async fn set_fail_market(&self, fail: bool) {
            *self.fail_market.lock().await = fail;
        }

        pub async fn set_fail_cancel(&self, times: u32) {
            *self.fail_cancel.lock().await = times;
        }

        pub async fn calls(&self) -> Vec<GatewayCall> {
            self.calls.lock().await.clone()
        }

        /// Calls that placed, cancelled or reconfigured anything
        pub async fn order_calls(&self) -> Vec<GatewayCall> {
            self.calls
                .lock()
                .await
                .iter()
                .filter(|c| c.is_order_side_effect())
                .cloned()
                .collect()
        }

        pub async fn clear_calls(&self) {
            self.calls.lock().await.clear();
        }

        /// Fill a resting limit order at its price, grow the position and
        /// return the closed order as a change notification
        pub async fn fill_order(&self, id: &str) -> Option<Order> {
            let mut orders = self.open_orders.lock().await;
            let idx = orders.iter().position(|o| o.id == id)?;
            let mut order = orders.remove(idx);
            drop(orders);

            self.apply_buy(order.amount, order.price).await;
            order.status = OrderStatus::Closed;

            if let Some(tx) = self.subscribers.lock().await.get(&order.symbol) {
                let _ = tx.send(order.clone());
            }
            Some(order)
        }

        async fn record(&self, call: GatewayCall) {
            self.calls.lock().await.push(call);
        }

        async fn apply_buy(&self, amount: f64, price: f64) {
            let mut position = self.position.lock().await;
            let prev_value = position.contracts * position.entry_price.unwrap_or(price);
            position.contracts += amount;
            if position.contracts > 0.0 {
                position.entry_price = Some((prev_value + amount * price) / position.contracts);
            }
        }

        fn order(&self, symbol: &str, side: OrderSide, kind: OrderKind, amount: f64, price: f64) -> Order {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            Order {
                id: id.to_string(),
                symbol: symbol.to_string(),
                side,
                kind,
                price,
                amount,
                status: OrderStatus::Open,
                reduce_only: side == OrderSide::Sell,
            }
        }
    }

    #[async_trait]
    impl OrderGateway for MockGateway {
        async fn init(&self, _symbol: &str) -> BasketResult<()> {
            self.record(GatewayCall::Init).await;
            if *self.fail_init.lock().await {
                return Err(BasketError::Gateway("Mock init failure".into()));
            }
            Ok(())
        }

        async fn buy_market(&self, symbol: &str, amount: f64) -> BasketResult<Order> {
            self.record(GatewayCall::BuyMarket { amount }).await;
            let price = self.market.lock().await.ask;
            self.apply_buy(amount, price).await;
            let mut order = self.order(symbol, OrderSide::Buy, OrderKind::Market, amount, price);
            order.status = OrderStatus::Closed;
            Ok(order)
        }

        async fn buy_limit(&self, symbol: &str, amount: f64, price: f64) -> BasketResult<Order> {
            self.record(GatewayCall::BuyLimit { amount, price }).await;
            let order = self.order(symbol, OrderSide::Buy, OrderKind::Limit, amount, price);
            self.open_orders.lock().await.push(order.clone());
            Ok(order)
        }

        async fn sell_market(&self, symbol: &str, amount: f64) -> BasketResult<Order> {
            self.record(GatewayCall::SellMarket { amount }).await;
            let price = self.market.lock().await.bid;
            {
                let mut position = self.position.lock().await;
                position.contracts = (position.contracts - amount).max(0.0);
                if position.contracts == 0.0 {
                    position.entry_price = None;
                }
            }
            let mut order = self.order(symbol, OrderSide::Sell, OrderKind::Market, amount, price);
            order.status = OrderStatus::Closed;
            Ok(order)
        }

        async fn cancel_all_orders(&self, _symbol: &str) -> BasketResult<u32> {
            self.record(GatewayCall::CancelAll).await;
            {
                let mut failures = self.fail_cancel.lock().await;
                if *failures > 0 {
                    *failures -= 1;
                    return Err(BasketError::Gateway("Mock cancel failure".into()));
                }
            }
            let mut orders = self.open_orders.lock().await;
            let count = orders.len() as u32;
            orders.clear();
            Ok(count)
        }

        async fn open_orders(&self, _symbol: &str) -> BasketResult<Vec<Order>> {
            self.record(GatewayCall::OpenOrders).await;
            Ok(self.open_orders.lock().await.clone())
        }

        async fn position(&self, _symbol: &str, side: PositionSide, force_refresh: bool) -> BasketResult<Position> {
            self.record(GatewayCall::Position { force_refresh }).await;
            match side {
                PositionSide::Long => Ok(self.position.lock().await.clone()),
                PositionSide::Short => Ok(Position::flat()),
            }
        }

        async fn market(&self, _symbol: &str) -> BasketResult<MarketSnapshot> {
            self.record(GatewayCall::Market).await;
            if *self.fail_market.lock().await {
                return Err(BasketError::Gateway("Mock market data unavailable".into()));
            }
            Ok(*self.market.lock().await)
        }

        async fn instrument(&self, _symbol: &str) -> BasketResult<InstrumentInfo> {
            self.record(GatewayCall::Instrument).await;
            Ok(*self.instrument.lock().await)
        }

        async fn set_leverage(&self, _symbol: &str, leverage: u32) -> BasketResult<()> {
            self.record(GatewayCall::SetLeverage(leverage)).await;
            Ok(())
        }
    }

    #[async_trait]
    impl OrderFeed for MockGateway {
        async fn subscribe(&self, symbol: &str) -> BasketResult<UnboundedReceiver<Order>> {
            let (tx, rx) = unbounded_channel();
            self.subscribers.lock().await.insert(symbol.to_string(), tx);
            Ok(rx)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{GatewayCall, MockGateway};
    use super::*;

    #[tokio::test]
    async fn test_usd_conversion_defaults() {
        let gateway = MockGateway::new(50.0);
        let contracts = gateway.usd_to_contracts("ADA/USDT:USDT", 100.0).await.unwrap();
        assert!((contracts - 2.0).abs() < 1e-9);

        let usd = gateway.contracts_to_usd("ADA/USDT:USDT", 3.0).await.unwrap();
        assert!((usd - 150.0).abs() < 1e-9);

        gateway.set_price(0.0).await;
        let contracts = gateway.usd_to_contracts("ADA/USDT:USDT", 100.0).await.unwrap();
        assert_eq!(contracts, 0.0);
    }

    #[tokio::test]
    async fn test_mock_fill_grows_position() {
        let gateway = MockGateway::new(100.0);
        gateway.buy_market("ADA/USDT:USDT", 1.0).await.unwrap();
        let order = gateway.buy_limit("ADA/USDT:USDT", 1.0, 90.0).await.unwrap();

        let filled = gateway.fill_order(&order.id).await.unwrap();
        assert!(filled.is_filled_grid_entry());

        let position = gateway
            .position("ADA/USDT:USDT", PositionSide::Long, true)
            .await
            .unwrap();
        assert_eq!(position.contracts, 2.0);
        assert!((position.entry_price.unwrap() - 95.0).abs() < 1e-9);
        assert!(gateway.open_orders("ADA/USDT:USDT").await.unwrap().is_empty());
        assert!(gateway
            .calls()
            .await
            .contains(&GatewayCall::Position { force_refresh: true }));
    }
}
