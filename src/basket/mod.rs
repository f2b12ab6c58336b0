//! Dynamic Grid Basket
//!
//! A per-symbol long-only grid: one market entry per round, one resting limit
//! buy below the price, re-placed lower and larger on every fill, and a full
//! exit once the bid clears the average entry by the take-profit distance.
//!
//! # Architecture
//!
//! - [`config`] - Basket configuration and validation
//! - [`types`] - Orders, positions, market snapshots
//! - [`errors`] - Basket error types
//! - [`strategy`] - Pure sizing, drawdown and take-profit rules
//! - [`state`] - Mutable basket state
//! - [`snapshot`] - Status row published to the report sink
//! - [`diagnostics`] - Grid fill log for diagnostic mode
//! - [`gateway`] - Venue abstraction (mockable for testing)
//! - [`scheduler`] - Time-triggered basket commands
//! - [`reporter`] - Report table sink
//! - [`basket`] - The basket itself
//! - [`runner`] - Per-basket event loop
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use grid_basket::basket::{BasketConfig, BasketRunner, RunnerConfig, TableReport, TaskScheduler};
//! use grid_basket::market::PaperGateway;
//!
//! // 10 USD entries, 10% grid step, 2% take profit, doubling, 50% drawdown
//! let config = BasketConfig::new("ADA/USDT:USDT", 10.0, 10.0, 2.0, 1.0, 50.0);
//!
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! let mut runner = BasketRunner::new(
//!     config,
//!     PaperGateway::new(0.05),
//!     TaskScheduler::new(),
//!     TableReport::new(),
//!     RunnerConfig::default(),
//!     shutdown_rx,
//! )
//! .await?;
//!
//! runner.run().await?;
//! ```
//!
//! # Testing
//!
//! Every collaborator has a recording double:
//!
//! ```rust,ignore
//! use grid_basket::basket::gateway::mock::MockGateway;
//! use grid_basket::basket::reporter::mock::RecordingReporter;
//! use grid_basket::basket::scheduler::mock::RecordingScheduler;
//!
//! let gateway = MockGateway::new(100.0);
//! let mut basket = GridBasket::new(config, gateway.clone(), RecordingScheduler::new(), RecordingReporter::new());
//! basket.new_round().await?;
//! assert_eq!(gateway.order_calls().await.len(), 2);
//! ```

pub mod basket;
pub mod config;
pub mod diagnostics;
pub mod errors;
pub mod gateway;
pub mod reporter;
pub mod runner;
pub mod scheduler;
pub mod snapshot;
pub mod state;
pub mod strategy;
pub mod types;

pub use basket::GridBasket;
pub use config::{BasketConfig, BasketParams, GRID_SIZE_ALERT_USD, MIN_LEVERAGE};
pub use diagnostics::{GridFillRecord, GridSizeLog, GridStepRecord};
pub use errors::{BasketError, BasketResult};
pub use gateway::{OrderFeed, OrderGateway};
pub use reporter::{StatusReporter, TableReport, BASKETS_INFO_TABLE, GRID_SIZE_INFO_TABLE, GRID_STEP_INFO_TABLE};
pub use runner::{BasketRunner, RunnerConfig};
pub use scheduler::{BasketCommand, Scheduler, TaskScheduler, TaskTime, TimeTask};
pub use snapshot::{BasketInfo, BasketInfoPatch, HealthStatus};
pub use state::BasketState;
pub use types::{BasketPhase, InstrumentInfo, MarketSnapshot, Order, OrderKind, OrderSide, OrderStatus, Position, PositionSide};
