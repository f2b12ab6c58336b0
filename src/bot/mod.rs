//! Bot Module
//!
//! The bot turns the configured symbol list into baskets: one
//! [`BasketRunner`] per symbol, all sharing a gateway, a scheduler and a
//! report sink. An optional dashboard serves the report tables over HTTP.
//!
//! # Usage Pattern
//!
//! ```ignore
//! use grid_basket::bot::{GridBot, GridBotConfig};
//! use grid_basket::basket::{BasketParams, TableReport, TaskScheduler};
//! use grid_basket::market::PaperGateway;
//!
//! let config = GridBotConfig::new(vec!["ADA/USDT:USDT".into()], BasketParams::default());
//! let bot = GridBot::new(config, PaperGateway::new(0.05), TaskScheduler::new(), TableReport::new());
//!
//! // Runs until the shutdown watch flips to true
//! bot.run(shutdown_rx).await?;
//! ```
//!
//! [`BasketRunner`]: crate::basket::BasketRunner

mod bot;
pub mod dashboard;
mod server;

pub use bot::{resolve_symbols, GridBot, GridBotConfig};
pub(crate) use server::start_server;
