//! Paper Market Module
//!
//! An in-memory venue implementing [`OrderGateway`] and [`OrderFeed`], plus a
//! random-walk price feed to drive it. Used to run the bot end to end without
//! exchange connectivity.
//!
//! # Example
//!
//! ```rust,ignore
//! use grid_basket::market::{PaperGateway, RandomWalkFeed};
//!
//! let gateway = PaperGateway::new(0.05);
//! gateway.add_symbol("ADA/USDT:USDT", 0.65).await;
//!
//! // 0.5% max move every second
//! let feed = RandomWalkFeed::new(gateway.clone(), 0.5, Duration::from_secs(1));
//! tokio::spawn(feed.run(shutdown_rx));
//! ```
//!
//! [`OrderGateway`]: crate::basket::OrderGateway
//! [`OrderFeed`]: crate::basket::OrderFeed

mod feed;
mod paper;

pub use feed::{next_price, RandomWalkFeed};
pub use paper::{PaperGateway, PaperPosition};
