//! Core data types for grid baskets

use serde::{Deserialize, Serialize};

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

/// Position side for hedge-mode style position lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionSide {
    Long,
    Short,
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    Market,
    Limit,
}

/// Order lifecycle status as reported by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Resting on the book
    Open,
    /// Fully filled
    Closed,
    /// Cancelled before filling
    Canceled,
}

/// An order as seen by the basket, both as a placement result and as a
/// change notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Gateway order identifier
    pub id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub kind: OrderKind,
    /// Limit price, or fill price for market orders
    pub price: f64,
    /// Amount in contracts
    pub amount: f64,
    pub status: OrderStatus,
    pub reduce_only: bool,
}

impl Order {
    /// True when a resting grid entry filled: closed, limit, not reduce-only.
    /// Market entries and exits are excluded.
    pub fn is_filled_grid_entry(&self) -> bool {
        self.status == OrderStatus::Closed && !self.reduce_only && self.kind == OrderKind::Limit
    }
}

/// Position on one side of a symbol
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Size in contracts, always non-negative
    pub contracts: f64,
    /// Average entry price, when the venue reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_price: Option<f64>,
}

impl Position {
    pub fn new(contracts: f64, entry_price: f64) -> Self {
        Self {
            contracts,
            entry_price: Some(entry_price),
        }
    }

    pub fn flat() -> Self {
        Self::default()
    }

    pub fn is_flat(&self) -> bool {
        self.contracts == 0.0
    }
}

/// Top-of-book and last trade for a symbol
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Reference price (last/mid)
    pub price: f64,
    pub bid: f64,
    pub ask: f64,
    /// Close of the latest candle
    pub close: f64,
}

impl MarketSnapshot {
    /// Snapshot with all fields at the same price
    pub fn at(price: f64) -> Self {
        Self {
            price,
            bid: price,
            ask: price,
            close: price,
        }
    }
}

/// Static instrument metadata
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InstrumentInfo {
    /// Base units per contract
    pub contract_size: f64,
    /// Maximum leverage allowed for this account and symbol
    pub max_leverage: u32,
    pub maker_fee: f64,
    pub taker_fee: f64,
}

impl Default for InstrumentInfo {
    fn default() -> Self {
        Self {
            contract_size: 1.0,
            max_leverage: 50,
            maker_fee: 0.0002,
            taker_fee: 0.0005,
        }
    }
}

/// Where the basket is in its round lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BasketPhase {
    /// No position, waiting for the next round to start
    Flat,
    /// Entry filled, first grid order resting
    RoundOpen,
    /// At least one grid order filled this round
    Pyramiding,
    /// Exiting the round
    Closing,
    /// Drawdown breached, basket disabled for the process lifetime
    Stopped,
}

impl BasketPhase {
    /// Check if the basket may still open rounds or place grid orders
    pub fn is_active(&self) -> bool {
        !matches!(self, BasketPhase::Stopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(kind: OrderKind, status: OrderStatus, reduce_only: bool) -> Order {
        Order {
            id: "1".into(),
            symbol: "ADA/USDT:USDT".into(),
            side: OrderSide::Buy,
            kind,
            price: 1.0,
            amount: 10.0,
            status,
            reduce_only,
        }
    }

    #[test]
    fn test_filled_grid_entry_filter() {
        assert!(order(OrderKind::Limit, OrderStatus::Closed, false).is_filled_grid_entry());
        assert!(!order(OrderKind::Market, OrderStatus::Closed, false).is_filled_grid_entry());
        assert!(!order(OrderKind::Limit, OrderStatus::Closed, true).is_filled_grid_entry());
        assert!(!order(OrderKind::Limit, OrderStatus::Open, false).is_filled_grid_entry());
        assert!(!order(OrderKind::Limit, OrderStatus::Canceled, false).is_filled_grid_entry());
    }

    #[test]
    fn test_position_flat() {
        assert!(Position::flat().is_flat());
        assert!(!Position::new(2.0, 100.0).is_flat());
    }

    #[test]
    fn test_phase_active() {
        assert!(BasketPhase::Flat.is_active());
        assert!(BasketPhase::Pyramiding.is_active());
        assert!(!BasketPhase::Stopped.is_active());
    }
}
