#![deny(unreachable_pub)]
pub mod basket;
pub mod bot;
pub mod config;
pub mod helpers;
pub mod market;
pub mod runner;

pub use basket::{
    BasketConfig, BasketError, BasketInfo, BasketResult, GridBasket, OrderGateway, Scheduler,
    StatusReporter,
};
pub use helpers::{percent_difference, round_to};
