//! Paper Trading Gateway
//!
//! Simulates a long-only perpetual venue in memory. Market orders fill at
//! the ask (buys) or bid (sells); resting limit buys fill at their limit
//! price once the last price trades at or below it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::basket::errors::{BasketError, BasketResult};
use crate::basket::gateway::{OrderFeed, OrderGateway};
use crate::basket::types::{
    InstrumentInfo, MarketSnapshot, Order, OrderKind, OrderSide, OrderStatus, Position, PositionSide,
};

/// Paper trading position tracking
#[derive(Debug, Clone, Default)]
pub struct PaperPosition {
    /// Long size in contracts
    pub contracts: f64,
    /// Average entry price
    pub entry_price: f64,
    /// Realized PnL in quote currency
    pub realized_pnl: f64,
}

impl PaperPosition {
    fn apply_buy(&mut self, qty: f64, price: f64) {
        let total_value = self.entry_price * self.contracts + price * qty;
        self.contracts += qty;
        self.entry_price = if self.contracts > 0.0 {
            total_value / self.contracts
        } else {
            0.0
        };
    }

    /// Reduce the position, returning the contracts actually closed
    fn apply_sell(&mut self, qty: f64, price: f64, contract_size: f64) -> f64 {
        let close_qty = qty.min(self.contracts);
        self.realized_pnl += (price - self.entry_price) * close_qty * contract_size;
        self.contracts -= close_qty;
        if self.contracts <= f64::EPSILON {
            self.contracts = 0.0;
            self.entry_price = 0.0;
        }
        close_qty
    }

    /// Unrealized PnL at `price`
    pub fn unrealized_pnl(&self, price: f64, contract_size: f64) -> f64 {
        (price - self.entry_price) * self.contracts * contract_size
    }
}

#[derive(Debug, Clone)]
struct SymbolBook {
    market: MarketSnapshot,
    instrument: InstrumentInfo,
    position: PaperPosition,
    /// Resting orders in placement order
    orders: Vec<Order>,
    leverage: u32,
}

#[derive(Default)]
struct PaperBook {
    symbols: HashMap<String, SymbolBook>,
    subscribers: HashMap<String, UnboundedSender<Order>>,
    total_fees: f64,
}

impl PaperBook {
    fn book(&mut self, symbol: &str) -> BasketResult<&mut SymbolBook> {
        self.symbols
            .get_mut(symbol)
            .ok_or_else(|| BasketError::SymbolNotFound(symbol.to_string()))
    }

    fn notify(&mut self, order: &Order) {
        let closed = match self.subscribers.get(&order.symbol) {
            Some(tx) => tx.send(order.clone()).is_err(),
            None => false,
        };
        if closed {
            debug!("Order subscriber for {} is gone", order.symbol);
            self.subscribers.remove(&order.symbol);
        }
    }
}

/// In-memory gateway for running baskets without a venue
///
/// Cheap to clone; clones share the same book.
#[derive(Clone)]
pub struct PaperGateway {
    book: Arc<Mutex<PaperBook>>,
    /// Full bid/ask spread in percent of the price
    spread_percent: f64,
}

impl PaperGateway {
    /// Create an empty paper venue
    ///
    /// # Arguments
    /// * `spread_percent` - Full bid/ask spread in percent of the price
    pub fn new(spread_percent: f64) -> Self {
        Self {
            book: Arc::new(Mutex::new(PaperBook::default())),
            spread_percent,
        }
    }

    /// List a symbol at a starting price with default instrument metadata
    pub async fn add_symbol(&self, symbol: &str, price: f64) {
        let instrument = InstrumentInfo::default();
        let market = self.snapshot_at(price);
        self.book.lock().await.symbols.insert(
            symbol.to_string(),
            SymbolBook {
                market,
                instrument,
                position: PaperPosition::default(),
                orders: Vec::new(),
                leverage: 1,
            },
        );
        info!("Paper market listed {} at {}", symbol, price);
    }

    fn snapshot_at(&self, price: f64) -> MarketSnapshot {
        let half_spread = price * self.spread_percent / 200.0;
        MarketSnapshot {
            price,
            bid: price - half_spread,
            ask: price + half_spread,
            close: price,
        }
    }

    /// Move the price and fill every resting buy at or above it
    ///
    /// # Returns
    /// Number of orders filled
    pub async fn update_price(&self, symbol: &str, price: f64) -> BasketResult<usize> {
        let market = self.snapshot_at(price);
        let mut book = self.book.lock().await;
        let sb = book.book(symbol)?;
        sb.market = market;

        let (crossed, resting): (Vec<Order>, Vec<Order>) = std::mem::take(&mut sb.orders)
            .into_iter()
            .partition(|o| o.side == OrderSide::Buy && price <= o.price);
        sb.orders = resting;

        let mut fees = 0.0;
        let mut filled = Vec::with_capacity(crossed.len());
        for mut order in crossed {
            sb.position.apply_buy(order.amount, order.price);
            fees += order.amount * order.price * sb.instrument.contract_size * sb.instrument.maker_fee;
            order.status = OrderStatus::Closed;
            info!(
                "Paper fill {} {}: buy {} @ {} (position {})",
                symbol, order.id, order.amount, order.price, sb.position.contracts
            );
            filled.push(order);
        }

        book.total_fees += fees;
        for order in &filled {
            book.notify(order);
        }
        Ok(filled.len())
    }

    /// Last price of a symbol
    pub async fn price(&self, symbol: &str) -> Option<f64> {
        self.book.lock().await.symbols.get(symbol).map(|sb| sb.market.price)
    }

    /// Listed symbols
    pub async fn symbols(&self) -> Vec<String> {
        self.book.lock().await.symbols.keys().cloned().collect()
    }

    pub async fn paper_position(&self, symbol: &str) -> Option<PaperPosition> {
        self.book
            .lock()
            .await
            .symbols
            .get(symbol)
            .map(|sb| sb.position.clone())
    }

    pub async fn total_fees(&self) -> f64 {
        self.book.lock().await.total_fees
    }

    pub async fn leverage(&self, symbol: &str) -> Option<u32> {
        self.book.lock().await.symbols.get(symbol).map(|sb| sb.leverage)
    }

    async fn fill_market(&self, symbol: &str, side: OrderSide, amount: f64) -> BasketResult<Order> {
        if amount.is_nan() || amount <= 0.0 {
            return Err(BasketError::Gateway(format!(
                "Invalid market order amount {} for {}",
                amount, symbol
            )));
        }

        let mut book = self.book.lock().await;
        let sb = book.book(symbol)?;
        let contract_size = sb.instrument.contract_size;
        let (price, filled) = match side {
            OrderSide::Buy => {
                sb.position.apply_buy(amount, sb.market.ask);
                (sb.market.ask, amount)
            }
            OrderSide::Sell => {
                let bid = sb.market.bid;
                (bid, sb.position.apply_sell(amount, bid, contract_size))
            }
        };
        let fee = filled * price * contract_size * sb.instrument.taker_fee;

        let order = Order {
            id: Uuid::new_v4().to_string(),
            symbol: symbol.to_string(),
            side,
            kind: OrderKind::Market,
            price,
            amount: filled,
            status: OrderStatus::Closed,
            reduce_only: side == OrderSide::Sell,
        };
        book.total_fees += fee;
        book.notify(&order);
        Ok(order)
    }
}

#[async_trait]
impl OrderGateway for PaperGateway {
    async fn init(&self, symbol: &str) -> BasketResult<()> {
        let mut book = self.book.lock().await;
        book.book(symbol)?;
        debug!("Paper gateway ready for {}", symbol);
        Ok(())
    }

    async fn buy_market(&self, symbol: &str, amount: f64) -> BasketResult<Order> {
        self.fill_market(symbol, OrderSide::Buy, amount).await
    }

    async fn buy_limit(&self, symbol: &str, amount: f64, price: f64) -> BasketResult<Order> {
        if amount.is_nan() || amount <= 0.0 || price <= 0.0 {
            return Err(BasketError::Gateway(format!(
                "Invalid limit order {} @ {} for {}",
                amount, price, symbol
            )));
        }

        let mut book = self.book.lock().await;
        let sb = book.book(symbol)?;
        let order = Order {
            id: Uuid::new_v4().to_string(),
            symbol: symbol.to_string(),
            side: OrderSide::Buy,
            kind: OrderKind::Limit,
            price,
            amount,
            status: OrderStatus::Open,
            reduce_only: false,
        };
        sb.orders.push(order.clone());
        Ok(order)
    }

    async fn sell_market(&self, symbol: &str, amount: f64) -> BasketResult<Order> {
        self.fill_market(symbol, OrderSide::Sell, amount).await
    }

    async fn cancel_all_orders(&self, symbol: &str) -> BasketResult<u32> {
        let mut book = self.book.lock().await;
        let cancelled = std::mem::take(&mut book.book(symbol)?.orders);
        for mut order in cancelled.iter().cloned() {
            order.status = OrderStatus::Canceled;
            book.notify(&order);
        }
        Ok(cancelled.len() as u32)
    }

    async fn open_orders(&self, symbol: &str) -> BasketResult<Vec<Order>> {
        let mut book = self.book.lock().await;
        Ok(book.book(symbol)?.orders.clone())
    }

    async fn position(&self, symbol: &str, side: PositionSide, _force_refresh: bool) -> BasketResult<Position> {
        let mut book = self.book.lock().await;
        let sb = book.book(symbol)?;
        match side {
            PositionSide::Long if sb.position.contracts > 0.0 => {
                Ok(Position::new(sb.position.contracts, sb.position.entry_price))
            }
            _ => Ok(Position::flat()),
        }
    }

    async fn market(&self, symbol: &str) -> BasketResult<MarketSnapshot> {
        let mut book = self.book.lock().await;
        Ok(book.book(symbol)?.market)
    }

    async fn instrument(&self, symbol: &str) -> BasketResult<InstrumentInfo> {
        let mut book = self.book.lock().await;
        Ok(book.book(symbol)?.instrument)
    }

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> BasketResult<()> {
        let mut book = self.book.lock().await;
        let sb = book.book(symbol)?;
        if leverage > sb.instrument.max_leverage {
            warn!(
                "Rejecting leverage {} for {}, max is {}",
                leverage, symbol, sb.instrument.max_leverage
            );
            return Err(BasketError::Gateway(format!(
                "Leverage {} exceeds maximum {}",
                leverage, sb.instrument.max_leverage
            )));
        }
        sb.leverage = leverage;
        Ok(())
    }
}

#[async_trait]
impl OrderFeed for PaperGateway {
    async fn subscribe(&self, symbol: &str) -> BasketResult<UnboundedReceiver<Order>> {
        let (tx, rx) = unbounded_channel();
        self.book.lock().await.subscribers.insert(symbol.to_string(), tx);
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SYMBOL: &str = "ADA/USDT:USDT";

    async fn gateway() -> PaperGateway {
        let gateway = PaperGateway::new(0.0);
        gateway.add_symbol(SYMBOL, 100.0).await;
        gateway
    }

    #[tokio::test]
    async fn test_unknown_symbol() {
        let gateway = gateway().await;
        assert!(matches!(
            gateway.init("DOGE/USDT:USDT").await,
            Err(BasketError::SymbolNotFound(_))
        ));
        assert!(gateway.init(SYMBOL).await.is_ok());
    }

    #[tokio::test]
    async fn test_spread_applied_to_market_orders() {
        let gateway = PaperGateway::new(1.0);
        gateway.add_symbol(SYMBOL, 100.0).await;

        let market = gateway.market(SYMBOL).await.unwrap();
        assert!((market.bid - 99.5).abs() < 1e-9);
        assert!((market.ask - 100.5).abs() < 1e-9);

        let order = gateway.buy_market(SYMBOL, 2.0).await.unwrap();
        assert_eq!(order.kind, OrderKind::Market);
        assert_eq!(order.status, OrderStatus::Closed);
        assert!((order.price - 100.5).abs() < 1e-9);
        assert!(gateway.total_fees().await > 0.0);
    }

    #[tokio::test]
    async fn test_limit_fills_when_price_crosses() {
        let gateway = gateway().await;
        let mut rx = gateway.subscribe(SYMBOL).await.unwrap();

        gateway.buy_market(SYMBOL, 1.0).await.unwrap();
        let limit = gateway.buy_limit(SYMBOL, 1.0, 90.0).await.unwrap();
        let entry_note = rx.recv().await.unwrap();
        assert_eq!(entry_note.kind, OrderKind::Market);

        assert_eq!(gateway.update_price(SYMBOL, 95.0).await.unwrap(), 0);
        assert_eq!(gateway.open_orders(SYMBOL).await.unwrap().len(), 1);

        assert_eq!(gateway.update_price(SYMBOL, 89.0).await.unwrap(), 1);
        let fill = rx.recv().await.unwrap();
        assert_eq!(fill.id, limit.id);
        assert!(fill.is_filled_grid_entry());

        let position = gateway.position(SYMBOL, PositionSide::Long, true).await.unwrap();
        assert_eq!(position.contracts, 2.0);
        assert!((position.entry_price.unwrap() - 95.0).abs() < 1e-9);
        assert!(gateway.open_orders(SYMBOL).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sell_is_reduce_only_and_realizes_pnl() {
        let gateway = gateway().await;
        gateway.buy_market(SYMBOL, 2.0).await.unwrap();
        gateway.update_price(SYMBOL, 110.0).await.unwrap();

        let order = gateway.sell_market(SYMBOL, 5.0).await.unwrap();
        assert!(order.reduce_only);
        assert_eq!(order.amount, 2.0);

        let paper = gateway.paper_position(SYMBOL).await.unwrap();
        assert_eq!(paper.contracts, 0.0);
        assert!((paper.realized_pnl - 20.0).abs() < 1e-9);
        assert!(gateway
            .position(SYMBOL, PositionSide::Long, false)
            .await
            .unwrap()
            .is_flat());
    }

    #[tokio::test]
    async fn test_cancel_all_notifies() {
        let gateway = gateway().await;
        let mut rx = gateway.subscribe(SYMBOL).await.unwrap();
        gateway.buy_limit(SYMBOL, 1.0, 90.0).await.unwrap();
        gateway.buy_limit(SYMBOL, 1.0, 80.0).await.unwrap();

        assert_eq!(gateway.cancel_all_orders(SYMBOL).await.unwrap(), 2);
        assert_eq!(rx.recv().await.unwrap().status, OrderStatus::Canceled);
        assert!(gateway.open_orders(SYMBOL).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_leverage_limit() {
        let gateway = gateway().await;
        assert!(gateway.set_leverage(SYMBOL, 30).await.is_ok());
        assert_eq!(gateway.leverage(SYMBOL).await, Some(30));
        assert!(gateway.set_leverage(SYMBOL, 100).await.is_err());
    }

    #[tokio::test]
    async fn test_rejects_invalid_amounts() {
        let gateway = gateway().await;
        assert!(gateway.buy_market(SYMBOL, 0.0).await.is_err());
        assert!(gateway.buy_limit(SYMBOL, 1.0, 0.0).await.is_err());
        assert!(gateway.buy_limit(SYMBOL, f64::NAN, 10.0).await.is_err());
    }
}
